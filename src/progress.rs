//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::batch::BatchRunner::with_progress`] to receive events as the
//! runner works through the input tree. The CLI uses it to drive a terminal
//! progress bar; library callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use invoice_ocr::BatchProgressCallback;
//! use std::path::Path;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, path: &Path, cost: f64) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total} {} ${cost:.4}", path.display());
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch runner as it processes each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. File indices are 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before the first file.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file is encoded and sent to the model.
    fn on_file_start(&self, index: usize, total_files: usize, path: &Path) {
        let _ = (index, total_files, path);
    }

    /// Called when a file produced a report row.
    ///
    /// * `cost`: USD spent on this file's model calls
    fn on_file_complete(&self, index: usize, total_files: usize, path: &Path, cost: f64) {
        let _ = (index, total_files, path, cost);
    }

    /// Called when a file was skipped.
    ///
    /// * `reason`: human-readable description of why
    fn on_file_skipped(&self, index: usize, total_files: usize, path: &Path, reason: &str) {
        let _ = (index, total_files, path, reason);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type held by [`crate::batch::BatchRunner`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
