//! Report rows and the CSV export.
//!
//! The CSV starts with a UTF-8 byte-order mark so spreadsheet tools that
//! default to a legacy code page still read Chinese vendor names correctly.

use crate::error::InvoiceError;
use crate::template::InvoiceRecord;
use crate::usage::{parse_cost, UsageMetrics};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// UTF-8 byte-order mark.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Run-level columns appended after the invoice fields.
pub const METADATA_COLUMNS: [&str; 3] = ["file_path", "execution_time", "total_cost"];

/// One processed file: the mapped invoice plus where it came from and what it cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub record: InvoiceRecord,
    pub file_path: String,
    pub execution_time: String,
    pub total_cost: String,
}

impl ReportRow {
    pub fn new(record: InvoiceRecord, file_path: &Path, metrics: &UsageMetrics) -> Self {
        Self {
            record,
            file_path: file_path.display().to_string(),
            execution_time: metrics.execution_time(),
            total_cost: metrics.total_cost_label(),
        }
    }

    /// Column names: invoice fields, then [`METADATA_COLUMNS`].
    pub fn header() -> Vec<&'static str> {
        InvoiceRecord::FIELD_NAMES
            .iter()
            .chain(METADATA_COLUMNS.iter())
            .copied()
            .collect()
    }

    /// Cell values in [`header`](Self::header) order.
    pub fn cells(&self) -> Result<Vec<String>, serde_json::Error> {
        let mut cells = self.record.cells()?;
        cells.push(self.file_path.clone());
        cells.push(self.execution_time.clone());
        cells.push(self.total_cost.clone());
        Ok(cells)
    }

    /// This row's cost in USD; an unparseable label counts as zero.
    pub fn cost(&self) -> f64 {
        parse_cost(&self.total_cost).unwrap_or(0.0)
    }
}

/// Sum of every row's cost.
pub fn total_cost(rows: &[ReportRow]) -> f64 {
    rows.iter().map(ReportRow::cost).sum()
}

/// Write `rows` to `<output_dir>/<file_name>`.
///
/// Returns `Ok(None)` without touching the filesystem when there are no rows.
pub fn write_csv(
    rows: &[ReportRow],
    output_dir: &Path,
    file_name: &str,
) -> Result<Option<PathBuf>, InvoiceError> {
    if rows.is_empty() {
        return Ok(None);
    }

    let path = output_dir.join(file_name);
    let write_err = |source: std::io::Error| InvoiceError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(output_dir).map_err(write_err)?;

    let mut file = File::create(&path).map_err(write_err)?;
    file.write_all(UTF8_BOM).map_err(write_err)?;

    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(ReportRow::header())
        .map_err(|e| write_err(e.into()))?;
    for row in rows {
        let cells = row.cells().map_err(|e| write_err(e.into()))?;
        writer
            .write_record(cells)
            .map_err(|e| write_err(e.into()))?;
    }
    writer.flush().map_err(write_err)?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(Some(path))
}
