use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{debug, instrument};

use crate::{split_row, CatalogError};

/// File name of the class catalog inside a metadata root.
pub const CLASS_CATALOG_FILE: &str = "class_labels_indices.csv";

/// One row of the class catalog after sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelEntry {
    pub index: u32,
    pub machine_id: String,
    pub display_name: String,
}

/// Lookup tables from machine id to display name and to class index.
///
/// Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    names: HashMap<String, String>,
    indices: HashMap<String, u32>,
}

impl LabelIndex {
    /// Reads `<meta_root>/class_labels_indices.csv`.
    pub fn from_meta_root(meta_root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::build(meta_root.as_ref().join(CLASS_CATALOG_FILE))
    }

    #[instrument(level = "trace", skip_all)]
    pub fn build(catalog_path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = catalog_path.as_ref();
        let file = File::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => CatalogError::CatalogNotFound {
                path: path.to_path_buf(),
            },
            _ => CatalogError::Io(err),
        })?;

        let index = Self::from_reader(BufReader::new(file))?;
        debug!(classes = index.len(), path = %path.display(), "loaded class catalog");
        Ok(index)
    }

    /// Parses a class catalog: one header line, then `index, machine_id, "display name"` rows.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, CatalogError> {
        let mut index = Self::default();

        // line 1 is the header
        for (line_no, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = parse_entry(&line, line_no + 1)?;
            index.insert(entry, line_no + 1)?;
        }

        Ok(index)
    }

    fn insert(&mut self, entry: ClassLabelEntry, line: usize) -> Result<(), CatalogError> {
        if self.names.contains_key(&entry.machine_id) {
            return Err(CatalogError::malformed(
                line,
                format!("duplicate machine id '{}'", entry.machine_id),
            ));
        }
        self.indices.insert(entry.machine_id.clone(), entry.index);
        self.names.insert(entry.machine_id, entry.display_name);
        Ok(())
    }

    pub fn resolve_name(&self, machine_id: &str) -> Result<&str, CatalogError> {
        self.names
            .get(machine_id)
            .map(String::as_str)
            .ok_or_else(|| CatalogError::UnknownLabel(machine_id.to_string()))
    }

    pub fn index_of(&self, machine_id: &str) -> Option<u32> {
        self.indices.get(machine_id).copied()
    }

    pub fn contains(&self, machine_id: &str) -> bool {
        self.names.contains_key(machine_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn parse_entry(line: &str, line_no: usize) -> Result<ClassLabelEntry, CatalogError> {
    let fields = split_row(line).map_err(|reason| CatalogError::malformed(line_no, reason))?;
    let [index, machine_id, display_name] = fields.as_slice() else {
        return Err(CatalogError::malformed(
            line_no,
            format!("expected 3 fields, found {}", fields.len()),
        ));
    };

    let index = index
        .replace(' ', "")
        .parse::<u32>()
        .map_err(|_| CatalogError::malformed(line_no, format!("invalid class index '{index}'")))?;
    let machine_id = machine_id.replace(' ', "");
    if machine_id.is_empty() {
        return Err(CatalogError::malformed(line_no, "empty machine id"));
    }

    Ok(ClassLabelEntry {
        index,
        machine_id,
        display_name: display_name.replace('"', "").replace(' ', "_"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "index,mid,display_name\n\
        0,/m/09x0r,\"Speech\"\n\
        1,/m/05zppz,\"Male speech, man speaking\"\n\
        2,/m/02zsn,\"Female speech, woman speaking\"\n";

    #[test]
    fn every_row_resolves_to_its_sanitized_name() {
        let index = LabelIndex::from_reader(CATALOG.as_bytes()).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.resolve_name("/m/09x0r").unwrap(), "Speech");
        assert_eq!(index.resolve_name("/m/05zppz").unwrap(), "Male_speech,_man_speaking");
        assert_eq!(index.resolve_name("/m/02zsn").unwrap(), "Female_speech,_woman_speaking");
        assert_eq!(index.index_of("/m/02zsn"), Some(2));
    }

    #[test]
    fn unknown_label_fails_lookup_only() {
        let index = LabelIndex::from_reader(CATALOG.as_bytes()).unwrap();

        match index.resolve_name("/m/nope") {
            Err(CatalogError::UnknownLabel(id)) => assert_eq!(id, "/m/nope"),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(index.contains("/m/09x0r"));
    }

    #[test]
    fn wrong_field_count_is_malformed() {
        let catalog = "index,mid,display_name\n0,/m/09x0r,\"Speech\"\n1,/m/05zppz\n";
        match LabelIndex::from_reader(catalog.as_bytes()) {
            Err(CatalogError::MalformedRecord { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn duplicate_machine_id_is_malformed() {
        let catalog = "header\n0,/m/a,A\n1,/m/a,B\n";
        assert!(matches!(
            LabelIndex::from_reader(catalog.as_bytes()),
            Err(CatalogError::MalformedRecord { line: 3, .. })
        ));
    }

    #[test]
    fn missing_file_is_catalog_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LabelIndex::from_meta_root(dir.path()),
            Err(CatalogError::CatalogNotFound { .. })
        ));
    }
}
