//! Record input files.
//!
//! An input file is a JSON array; each element becomes one work item payload.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;

/// Read a JSON array of records from `path`.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path)?;
    parse_records(&content)
}

/// Parse a JSON array of records. Anything other than an array is an error.
pub fn parse_records(content: &str) -> Result<Vec<Value>> {
    let records: Vec<Value> = serde_json::from_str(content)?;
    log::debug!("Parsed {} record(s)", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BulkError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_array() {
        let records = parse_records(r#"[{"sku": "A-1"}, {"sku": "B-2"}, 3]"#).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["sku"], "A-1");
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_records("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_records(r#"{"sku": "A-1"}"#).unwrap_err();
        assert!(matches!(err, BulkError::Json(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"sku": "A-1"}}]"#).unwrap();
        let records = load_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_records(Path::new("/nonexistent/items.json")).unwrap_err();
        assert!(matches!(err, BulkError::Io(_)));
    }
}
