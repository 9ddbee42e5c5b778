//! Export Converter: results to import CSVs, archive and per-restaurant JSON
//!
//! Nothing here fails on a well-formed result sequence; only writing to disk
//! can fail.

mod archive;
mod columns;

pub use archive::{ARCHIVE_SCHEMA_VERSION, read_archive, to_archive};
pub use columns::{
    Column, ITEM_COLUMNS, ITEMS_SCHEMA_VERSION, RESTAURANT_COLUMNS, RESTAURANTS_SCHEMA_VERSION,
    Source, mapping_guide,
};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ErrorKind, ExportError, ScrapeError};
use crate::model::{Outcome, ScrapeResult};
use columns::RowContext;

pub const ITEMS_CSV: &str = "menu_items_import.csv";
pub const RESTAURANTS_CSV: &str = "restaurants_import.csv";
pub const ARCHIVE_FILE: &str = "records.json.gz";
pub const FAILURES_FILE: &str = "failures.json";
pub const FIELD_MAPPING_FILE: &str = "field_mapping.md";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One destination row; cells line up with the table it was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub cells: Vec<String>,
}

/// Failed targets, counted by kind and listed with their messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub total: usize,
    pub by_kind: BTreeMap<ErrorKind, usize>,
    pub failures: Vec<FailureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub target_id: usize,
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub rows: Vec<ExportRow>,
    pub failures: FailureSummary,
}

/// What `write_outputs` produced
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub files: Vec<PathBuf>,
    pub item_rows: usize,
    pub restaurants: usize,
    pub failures: usize,
}

/// Flatten successful results into menu item rows
///
/// One row per (restaurant, category, item); a restaurant without items
/// still gets one row with the item columns empty. Failures are summarized,
/// never dropped.
pub fn to_destination_rows(results: &[ScrapeResult]) -> Conversion {
    let mut rows = Vec::new();

    for record in results.iter().filter_map(ScrapeResult::record) {
        let before = rows.len();
        for category in &record.menu {
            for item in &category.items {
                rows.push(build_row(
                    ITEM_COLUMNS,
                    &RowContext {
                        record,
                        entry: Some((category, item)),
                    },
                ));
            }
        }
        if rows.len() == before {
            rows.push(build_row(ITEM_COLUMNS, &RowContext { record, entry: None }));
        }
    }

    Conversion {
        rows,
        failures: summarize_failures(results),
    }
}

/// One row per successful restaurant
pub fn to_restaurant_rows(results: &[ScrapeResult]) -> Vec<ExportRow> {
    results
        .iter()
        .filter_map(ScrapeResult::record)
        .map(|record| build_row(RESTAURANT_COLUMNS, &RowContext { record, entry: None }))
        .collect()
}

pub fn summarize_failures(results: &[ScrapeResult]) -> FailureSummary {
    let mut summary = FailureSummary::default();
    for result in results {
        if let Outcome::Failure { kind, message } = &result.outcome {
            summary.total += 1;
            *summary.by_kind.entry(*kind).or_insert(0) += 1;
            summary.failures.push(FailureEntry {
                target_id: result.target.id,
                url: result.target.url.clone(),
                kind: *kind,
                message: message.clone(),
            });
        }
    }
    summary
}

fn build_row(columns: &[Column], ctx: &RowContext<'_>) -> ExportRow {
    ExportRow {
        cells: columns.iter().map(|c| c.source.cell(ctx)).collect(),
    }
}

/// Serialize rows as a BOM-prefixed UTF-8 CSV with a header
pub fn write_csv<W: Write>(
    mut out: W,
    columns: &[Column],
    rows: &[ExportRow],
) -> Result<(), ExportError> {
    out.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(columns::header(columns))?;
    for row in rows {
        writer.write_record(&row.cells)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn csv_bytes(columns: &[Column], rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_csv(&mut buf, columns, rows)?;
    Ok(buf)
}

/// Write every artifact for a run into `dir`
///
/// Produces both import CSVs, the archive, `failures.json`, and one
/// `<slug>_data.json` per successful restaurant.
pub fn write_outputs(results: &[ScrapeResult], dir: &Path) -> Result<ExportSummary, ExportError> {
    fs::create_dir_all(dir)?;
    let mut summary = ExportSummary::default();

    let conversion = to_destination_rows(results);
    let restaurant_rows = to_restaurant_rows(results);

    let path = dir.join(ITEMS_CSV);
    fs::write(&path, csv_bytes(ITEM_COLUMNS, &conversion.rows)?)?;
    summary.files.push(path);

    let path = dir.join(RESTAURANTS_CSV);
    fs::write(&path, csv_bytes(RESTAURANT_COLUMNS, &restaurant_rows)?)?;
    summary.files.push(path);

    let path = dir.join(ARCHIVE_FILE);
    fs::write(&path, to_archive(results)?)?;
    summary.files.push(path);

    let path = dir.join(FAILURES_FILE);
    fs::write(&path, serde_json::to_vec_pretty(&conversion.failures)?)?;
    summary.files.push(path);

    let path = dir.join(FIELD_MAPPING_FILE);
    fs::write(&path, mapping_guide())?;
    summary.files.push(path);

    for result in results.iter().filter(|r| r.record().is_some()) {
        let path = dir.join(format!("{}_data.json", result.target.slug));
        fs::write(&path, serde_json::to_vec_pretty(result)?)?;
        debug!(path = %path.display(), "Wrote restaurant data");
        summary.files.push(path);
    }

    summary.item_rows = conversion.rows.len();
    summary.restaurants = restaurant_rows.len();
    summary.failures = conversion.failures.total;

    info!(
        dir = %dir.display(),
        item_rows = summary.item_rows,
        restaurants = summary.restaurants,
        failures = summary.failures,
        "Export written"
    );
    Ok(summary)
}

/// Re-run the export from an archive written by an earlier run
pub fn convert_archive(archive: &Path, dir: &Path) -> Result<ExportSummary, ScrapeError> {
    let bytes = fs::read(archive)?;
    let results = read_archive(&bytes)?;
    info!(records = results.len(), archive = %archive.display(), "Archive loaded");
    Ok(write_outputs(&results, dir)?)
}
