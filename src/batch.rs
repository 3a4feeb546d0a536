//! Batch entry points: walk a directory, extract every invoice, write the report.
//!
//! Files are processed one after another in traversal order. Each file gets
//! its own [`VisionClient`] and therefore its own usage tracker, so the cost
//! column of a row covers exactly that file's two model calls.
//!
//! A file that fails for any reason (unreadable, corrupt PDF, model down,
//! reply not JSON) is logged, recorded in [`BatchSummary::skipped`], and left
//! out of the report. The batch itself only fails when the report cannot be
//! written; a missing input root simply yields no rows.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::pipeline::encode;
use crate::pipeline::input::{self, InputFile};
use crate::pipeline::llm::VisionModel;
use crate::progress::ProgressCallback;
use crate::report::{self, ReportRow};
use crate::template::{map_extraction, InvoiceRecord};
use crate::usage::UsageMetrics;
use crate::vision::VisionClient;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// The outcome of one successfully processed file.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub path: PathBuf,
    pub record: InvoiceRecord,
    pub metrics: UsageMetrics,
}

impl ProcessedFile {
    pub fn into_row(self) -> ReportRow {
        ReportRow::new(self.record, &self.path, &self.metrics)
    }
}

/// A file that produced no row, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything a batch run produced.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Rows in the order their files were visited.
    pub rows: Vec<ReportRow>,
    pub skipped: Vec<SkippedFile>,
    /// Sum of the rows' `total_cost` values, in USD.
    pub total_cost: f64,
    /// Where the CSV was written; `None` when there were no rows.
    pub report_path: Option<PathBuf>,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.rows.len()
    }
}

/// Sequential invoice extractor over a [`VisionModel`].
pub struct BatchRunner<M> {
    model: M,
    config: ExtractionConfig,
    progress: Option<ProgressCallback>,
}

impl<M: VisionModel> BatchRunner<M> {
    pub fn new(model: M, config: ExtractionConfig) -> Self {
        Self {
            model,
            config,
            progress: None,
        }
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Walk `input_root`, process every eligible file, and write the CSV into
    /// `output_dir` if at least one file succeeded.
    pub async fn run(
        &self,
        input_root: &Path,
        output_dir: &Path,
    ) -> Result<BatchSummary, InvoiceError> {
        let (rows, skipped) = self.collect(input_root).await;

        let report_path = report::write_csv(&rows, output_dir, &self.config.report_file_name)?;
        let total_cost = report::total_cost(&rows);

        match &report_path {
            Some(path) => info!(
                "Results saved to {} ({} files, total cost ${:.4})",
                path.display(),
                rows.len(),
                total_cost
            ),
            None => info!("No results to save"),
        }

        Ok(BatchSummary {
            rows,
            skipped,
            total_cost,
            report_path,
        })
    }

    /// Process every eligible file under `input_root` without writing anything.
    pub async fn collect(&self, input_root: &Path) -> (Vec<ReportRow>, Vec<SkippedFile>) {
        let files = input::discover(input_root);
        let total = files.len();
        info!("Found {} files under {}", total, input_root.display());

        if let Some(ref cb) = self.progress {
            cb.on_batch_start(total);
        }

        let mut rows = Vec::new();
        let mut skipped = Vec::new();

        for (i, file) in files.iter().enumerate() {
            let index = i + 1;
            info!("Processing: {}", file.path.display());
            if let Some(ref cb) = self.progress {
                cb.on_file_start(index, total, &file.path);
            }

            let reason = match self.process_file(file).await {
                Ok(Some(processed)) => {
                    let row = processed.into_row();
                    if let Some(ref cb) = self.progress {
                        cb.on_file_complete(index, total, &file.path, row.cost());
                    }
                    rows.push(row);
                    continue;
                }
                Ok(None) => {
                    warn!("Failed to process {}: no result", file.path.display());
                    "no result from model".to_string()
                }
                Err(e) => {
                    error!("Error processing {}: {}", display_name(&file.path), e);
                    e.to_string()
                }
            };

            if let Some(ref cb) = self.progress {
                cb.on_file_skipped(index, total, &file.path, &reason);
            }
            skipped.push(SkippedFile {
                path: file.path.clone(),
                reason,
            });
        }

        if let Some(ref cb) = self.progress {
            cb.on_batch_complete(total, rows.len());
        }

        (rows, skipped)
    }

    /// Process a single path, which must have an eligible extension.
    pub async fn process_path(&self, path: &Path) -> Result<Option<ProcessedFile>, InvoiceError> {
        let file = InputFile::from_path(path).ok_or_else(|| InvoiceError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: "expected a .jpg, .jpeg, .png or .pdf file".into(),
        })?;
        self.process_file(&file).await
    }

    /// Encode, classify, extract and map one file.
    ///
    /// `Ok(None)` means the file has no result (extraction call failed, or the
    /// model returned an empty object).
    pub async fn process_file(
        &self,
        file: &InputFile,
    ) -> Result<Option<ProcessedFile>, InvoiceError> {
        let mut client = VisionClient::new(&self.model, &self.config);
        client.tracker_mut().start();

        let payload = encode::encode_file(file, self.config.max_rendered_pixels).await?;

        let Some((raw, category)) = client.extract(&payload).await? else {
            return Ok(None);
        };

        let record = map_extraction(&raw, &category);
        let metrics = client.tracker().metrics()?;

        Ok(Some(ProcessedFile {
            path: file.path.clone(),
            record,
            metrics,
        }))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
