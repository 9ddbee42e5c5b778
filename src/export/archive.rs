//! Gzip'd JSON archive of successful results
//!
//! Output is deterministic: records keep their input order and the gzip
//! header carries no timestamp, so the same results produce the same bytes.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use super::columns::{ITEMS_SCHEMA_VERSION, RESTAURANTS_SCHEMA_VERSION};
use crate::error::ExportError;
use crate::model::ScrapeResult;

pub const ARCHIVE_SCHEMA_VERSION: &str = "records/v1";

#[derive(Debug, Serialize, Deserialize)]
struct Archive {
    schema_version: String,
    /// Column table versions of the CSVs written alongside
    #[serde(default)]
    item_columns: String,
    #[serde(default)]
    restaurant_columns: String,
    records: Vec<ScrapeResult>,
}

/// Archive every successful result; failures are left out
pub fn to_archive(results: &[ScrapeResult]) -> Result<Vec<u8>, ExportError> {
    let archive = Archive {
        schema_version: ARCHIVE_SCHEMA_VERSION.to_string(),
        item_columns: ITEMS_SCHEMA_VERSION.to_string(),
        restaurant_columns: RESTAURANTS_SCHEMA_VERSION.to_string(),
        records: results
            .iter()
            .filter(|r| r.record().is_some())
            .cloned()
            .collect(),
    };

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    serde_json::to_writer(&mut encoder, &archive)?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}

/// Read an archive back into results, for offline re-conversion
pub fn read_archive(bytes: &[u8]) -> Result<Vec<ScrapeResult>, ExportError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut json)?;
    let archive: Archive = serde_json::from_slice(&json)?;

    if archive.schema_version != ARCHIVE_SCHEMA_VERSION {
        return Err(ExportError::ArchiveSchema {
            expected: ARCHIVE_SCHEMA_VERSION.to_string(),
            found: archive.schema_version,
        });
    }
    Ok(archive.records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_other_schema_versions() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(br#"{"schema_version":"records/v0","records":[]}"#)
            .unwrap();
        let bytes = encoder.finish().unwrap();

        assert!(matches!(
            read_archive(&bytes),
            Err(ExportError::ArchiveSchema { found, .. }) if found == "records/v0"
        ));
    }

    #[test]
    fn header_records_column_versions() {
        let mut json = String::new();
        GzDecoder::new(to_archive(&[]).unwrap().as_slice())
            .read_to_string(&mut json)
            .unwrap();
        let header: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(header["schema_version"], ARCHIVE_SCHEMA_VERSION);
        assert_eq!(header["item_columns"], ITEMS_SCHEMA_VERSION);
        assert_eq!(header["restaurant_columns"], RESTAURANTS_SCHEMA_VERSION);
    }

    #[test]
    fn rejects_non_gzip_input() {
        assert!(matches!(read_archive(b"plain text"), Err(ExportError::Io(_))));
    }
}
