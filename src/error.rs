//! Error type for the invoice-ocr library.
//!
//! A single [`InvoiceError`] covers every failure, but the variants fall into
//! two groups with different consequences:
//!
//! * **Run-fatal**: missing credentials, an invalid configuration, or an
//!   output directory that cannot be written. These abort the run before (or
//!   instead of) producing a report.
//!
//! * **Per-file**: an unreadable image, a corrupt PDF, a model response that
//!   is not JSON. [`crate::batch::BatchRunner`] logs these with the file name
//!   and moves on to the next file, so one bad scan never costs the batch.
//!
//! [`InvoiceError::is_fatal`] tells the two apart.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the invoice-ocr library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The provider's API key is not set in the environment.
    #[error("No API key for provider '{provider}'.\nSet {var} before running, e.g. export {var}=...")]
    MissingCredentials { provider: String, var: String },

    /// The provider could not be constructed (unknown name, bad model id, …).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file's bytes are not an image format the model accepts.
    #[error("Unsupported image format in '{path}': {detail}")]
    UnsupportedFormat { path: PathBuf, detail: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF opened but contains no pages to render.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// pdfium-render returned an error while rendering the first page.
    #[error("Rasterisation failed for '{path}': {detail}")]
    RasterisationFailed { path: PathBuf, detail: String },

    /// The rendered page could not be re-encoded as PNG.
    #[error("Image encoding failed: {0}")]
    ImageEncoding(#[from] image::ImageError),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Rendering PDFs needs the pdfium shared library. Either:\n\
  • place libpdfium next to the executable or in the working directory,\n\
  • install it system-wide, or\n\
  • set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model call itself failed (network, HTTP status, provider error).
    #[error("Model call '{call}' failed: {detail}")]
    Transport { call: String, detail: String },

    /// The extraction reply contained no parseable JSON object.
    #[error("Could not extract structured data from model response: {detail}")]
    Parse { detail: String },

    // ── State errors ──────────────────────────────────────────────────────
    /// An operation was called out of order.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the output directory or write the report.
    #[error("Failed to write report '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// True when the error must abort the whole run rather than skip one file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InvoiceError::MissingCredentials { .. }
                | InvoiceError::ProviderNotConfigured { .. }
                | InvoiceError::InvalidConfig(_)
                | InvoiceError::OutputWriteFailed { .. }
        )
    }
}
