//! `metadata.csv` timestamp lookup.
//!
//! The companion file lives inside the labels folder with header
//! `filename,date`; lookup is by exact filename match.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{IndexerError, IndexerResult};

pub const METADATA_FILENAME: &str = "metadata.csv";

/// In-memory filename -> date table loaded once per run.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    entries: HashMap<String, NaiveDate>,
}

impl MetadataTable {
    /// Load `metadata.csv` from the labels folder.
    pub fn load(labels_dir: &Path) -> IndexerResult<Self> {
        let path = labels_dir.join(METADATA_FILENAME);
        if !path.exists() {
            return Err(IndexerError::MissingMetadata {
                filename: METADATA_FILENAME.to_string(),
                reason: format!("no {} in {}", METADATA_FILENAME, labels_dir.display()),
            });
        }

        let mut reader = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| IndexerError::MalformedMetadata {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let headers = reader
            .headers()
            .map_err(|e| IndexerError::MalformedMetadata {
                path: path.clone(),
                reason: e.to_string(),
            })?
            .clone();
        let filename_col = column_index(&headers, "filename").ok_or_else(|| {
            IndexerError::MalformedMetadata {
                path: path.clone(),
                reason: "missing 'filename' column".to_string(),
            }
        })?;
        let date_col =
            column_index(&headers, "date").ok_or_else(|| IndexerError::MalformedMetadata {
                path: path.clone(),
                reason: "missing 'date' column".to_string(),
            })?;

        let mut entries = HashMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| IndexerError::MalformedMetadata {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let filename = record.get(filename_col).unwrap_or("").to_string();
            let raw_date = record.get(date_col).unwrap_or("");
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
                IndexerError::MalformedMetadata {
                    path: path.clone(),
                    reason: format!("row {}: unparsable date {:?}", line + 2, raw_date),
                }
            })?;
            entries.insert(filename, date);
        }

        Ok(MetadataTable { entries })
    }

    /// Look up a label file's date by exact filename.
    pub fn date_for(&self, filename: &str) -> IndexerResult<NaiveDate> {
        self.entries
            .get(filename)
            .copied()
            .ok_or_else(|| IndexerError::MissingMetadata {
                filename: filename.to_string(),
                reason: "no matching row".to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, body: &str) {
        let mut f = std::fs::File::create(dir.join(METADATA_FILENAME)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn test_lookup_by_exact_filename() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "filename,date\nfield_a.geojson,2024-08-26\nfield_b.geojson,2025-04-23\n",
        );
        let table = MetadataTable::load(dir.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.date_for("field_a.geojson").unwrap(),
            NaiveDate::from_ymd_opt(2024, 8, 26).unwrap()
        );
        assert!(matches!(
            table.date_for("missing.geojson"),
            Err(IndexerError::MissingMetadata { .. })
        ));
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MetadataTable::load(dir.path()),
            Err(IndexerError::MissingMetadata { .. })
        ));
    }

    #[test]
    fn test_bad_date_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "filename,date\na.geojson,26/08/2024\n");
        assert!(matches!(
            MetadataTable::load(dir.path()),
            Err(IndexerError::MalformedMetadata { .. })
        ));
    }
}
