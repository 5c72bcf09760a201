use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, instrument};

use crate::{split_row, CatalogError};

/// Number of comment lines at the top of every published segment catalog.
pub const SEGMENT_HEADER_LINES: usize = 3;

/// One timestamped clip reference from a segment catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub video_id: String,
    pub start_time: f64,
    pub end_time: f64,
    pub label_ids: Vec<String>,
}

impl SegmentRecord {
    /// Parses `video_id, start_time, end_time, "label_id1,label_id2,..."`.
    pub fn parse(line: &str, line_no: usize) -> Result<Self, CatalogError> {
        let malformed = |reason: String| CatalogError::MalformedRecord {
            line: line_no,
            reason,
        };

        let fields = split_row(line).map_err(|reason| malformed(reason.to_string()))?;
        let [video_id, start_time, end_time, labels] = fields.as_slice() else {
            return Err(malformed(format!("expected 4 fields, found {}", fields.len())));
        };

        if video_id.is_empty() {
            return Err(malformed("empty video id".to_string()));
        }
        let parse_time = |raw: &str| {
            raw.parse::<f64>()
                .ok()
                .filter(|time| time.is_finite() && *time >= 0.0)
                .ok_or_else(|| malformed(format!("invalid timestamp '{raw}'")))
        };
        let start_time = parse_time(start_time.as_str())?;
        let end_time = parse_time(end_time.as_str())?;
        if end_time < start_time {
            return Err(malformed(format!(
                "segment ends ({end_time}) before it starts ({start_time})"
            )));
        }

        let label_ids = labels
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if label_ids.is_empty() {
            return Err(malformed("segment has no labels".to_string()));
        }

        Ok(Self {
            video_id: video_id.clone(),
            start_time,
            end_time,
            label_ids,
        })
    }
}

/// A segment catalog file held as its header and raw data rows.
///
/// Rows are parsed lazily by [`SegmentCatalog::records`], so a bad row only
/// affects itself.
#[derive(Debug)]
pub struct SegmentCatalog {
    path: PathBuf,
    header: Vec<String>,
    rows: Vec<(usize, String)>,
}

impl SegmentCatalog {
    #[instrument(level = "trace", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, header_lines: usize) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => CatalogError::CatalogNotFound {
                path: path.to_path_buf(),
            },
            _ => CatalogError::Io(err),
        })?;

        let mut lines = contents.lines().enumerate();
        let header = lines
            .by_ref()
            .take(header_lines)
            .map(|(_, line)| line.to_string())
            .collect();
        let rows = lines
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| (index + 1, line.to_string()))
            .collect::<Vec<_>>();
        debug!(rows = rows.len(), "opened segment catalog");

        Ok(Self {
            path: path.to_path_buf(),
            header,
            rows,
        })
    }

    /// File name without the `.csv` extension, used as the destination directory name.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parsed rows in file order, each carrying its own parse result.
    pub fn records(&self) -> impl Iterator<Item = Result<SegmentRecord, CatalogError>> + '_ {
        self.rows
            .iter()
            .map(|(line_no, line)| SegmentRecord::parse(line, *line_no))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_published_row_format() {
        let record =
            SegmentRecord::parse(r#"--4gqARaEJE, 0.000, 10.000, "/m/068hy,/m/07q6cd_,/m/0bt9lr""#, 4)
                .unwrap();

        assert_eq!(record.video_id, "--4gqARaEJE");
        assert_eq!(record.start_time, 0.0);
        assert_eq!(record.end_time, 10.0);
        assert_eq!(record.label_ids, ["/m/068hy", "/m/07q6cd_", "/m/0bt9lr"]);
    }

    #[test]
    fn rejects_bad_rows_with_their_line() {
        for line in [
            "yt1, 0, 10",
            "yt1, zero, 10, \"/m/a\"",
            "yt1, 10, 5, \"/m/a\"",
            "yt1, 0, 10, \"\"",
        ] {
            match SegmentRecord::parse(line, 7) {
                Err(CatalogError::MalformedRecord { line, .. }) => assert_eq!(line, 7),
                other => panic!("{line}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn catalog_skips_header_and_keeps_bad_rows_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eval_segments.csv");
        fs::write(
            &path,
            "# Segments csv created Sun Mar  5 10:54:31 2017\n\
             # num_ysids=20371, num_segs=20371, num_unique_labels=527, num_positive_labels=51804\n\
             # YTID, start_seconds, end_seconds, positive_labels\n\
             yt123, 0.000, 10.000, \"/m/09x0r\"\n\
             broken row\n\
             \n\
             yt456, 30.000, 40.000, \"/m/09x0r,/m/05zppz\"\n",
        )
        .unwrap();

        let catalog = SegmentCatalog::open(&path, SEGMENT_HEADER_LINES).unwrap();
        assert_eq!(catalog.stem(), "eval_segments");
        assert_eq!(catalog.header().len(), 3);
        assert_eq!(catalog.len(), 3);

        let records = catalog.records().collect::<Vec<_>>();
        assert_eq!(records[0].as_ref().unwrap().video_id, "yt123");
        assert!(matches!(records[1], Err(CatalogError::MalformedRecord { line: 5, .. })));
        assert_eq!(records[2].as_ref().unwrap().label_ids.len(), 2);
    }

    #[test]
    fn missing_catalog_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SegmentCatalog::open(dir.path().join("nope.csv"), SEGMENT_HEADER_LINES),
            Err(CatalogError::CatalogNotFound { .. })
        ));
    }
}
