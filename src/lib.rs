//! # invoice-ocr
//!
//! Extract structured data from invoice and receipt scans using Vision
//! Language Models (VLMs).
//!
//! Each image (or the first page of each PDF) goes through two model calls:
//! one classifies the document into one of five Taiwanese invoice categories,
//! the other returns the invoice fields as JSON. The JSON is normalised into a
//! fixed [`InvoiceRecord`] and every record becomes one row of a CSV report,
//! with the file's latency and model cost alongside.
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory
//!  │
//!  ├─ 1. Walk     keep .jpg / .jpeg / .png / .pdf, name order
//!  ├─ 2. Encode   image bytes or rendered PDF page → base64
//!  ├─ 3. VLM      classify, then extract (sequential, per-file usage)
//!  ├─ 4. Map      raw JSON → fixed InvoiceRecord template
//!  └─ 5. Report   invoice_results.csv (UTF-8 BOM) + total cost
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_ocr::{BatchRunner, ExtractionConfig, ProviderModel};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Fails fast when OPENAI_API_KEY is not set.
//!     let config = ExtractionConfig::default();
//!     let model = ProviderModel::connect(&config)?;
//!     let summary = BatchRunner::new(model, config)
//!         .run(Path::new("data"), Path::new("output"))
//!         .await?;
//!     eprintln!("{} files, ${:.4}", summary.processed(), summary.total_cost);
//!     Ok(())
//! }
//! ```
//!
//! ## Cost
//!
//! Usage is priced at a fixed $10 per million input tokens and $30 per
//! million output tokens (see [`usage::DEFAULT_PRICING`]).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod template;
pub mod usage;
pub mod vision;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{BatchRunner, BatchSummary, ProcessedFile, SkippedFile};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::InvoiceError;
pub use pipeline::encode::EncodedPayload;
pub use pipeline::input::{InputFile, MediaKind};
pub use pipeline::llm::{ProviderModel, VisionModel, VisionReply, VisionRequest};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::ReportRow;
pub use template::{map_extraction, ExtractionResult, InvoiceRecord, LineItem, Scalar};
pub use usage::{TokenUsage, UsageMetrics, UsageRecord, UsageTracker};
pub use vision::VisionClient;
