use std::{io, path::PathBuf};

pub mod labels;
pub mod segments;
pub mod store;

pub use labels::LabelIndex;
pub use segments::{SegmentCatalog, SegmentRecord};
pub use store::SampleStore;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog file not found: {}", path.display())]
    CatalogNotFound { path: PathBuf },
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("unknown label id '{0}'")]
    UnknownLabel(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CatalogError {
    fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}

/// Splits one catalog row into trimmed fields.
///
/// Commas inside double quotes do not split, the quotes themselves are dropped
/// and `""` inside a quoted field is a literal quote. Whitespace between a
/// delimiter and an opening quote is ignored, so `a, "b,c"` yields `["a", "b,c"]`.
pub fn split_row(line: &str) -> Result<Vec<String>, &'static str> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field");
    }
    fields.push(field.trim().to_string());

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_fields() {
        assert_eq!(split_row("0,/m/09x0r,Speech").unwrap(), ["0", "/m/09x0r", "Speech"]);
    }

    #[test]
    fn keeps_quoted_commas_together() {
        let fields = split_row(r#"--4gqARaEJE, 0.000, 10.000, "/m/068hy,/m/07q6cd_""#).unwrap();
        assert_eq!(fields, ["--4gqARaEJE", "0.000", "10.000", "/m/068hy,/m/07q6cd_"]);

        let fields = split_row(r#"1,/m/05zppz,"Male speech, man speaking""#).unwrap();
        assert_eq!(fields, ["1", "/m/05zppz", "Male speech, man speaking"]);
    }

    #[test]
    fn doubled_quote_is_literal() {
        assert_eq!(split_row(r#"a,"say ""hi""""#).unwrap(), ["a", r#"say "hi""#]);
    }

    #[test]
    fn rejects_unterminated_quote() {
        assert!(split_row(r#"a, "b,c"#).is_err());
    }
}
