//! Input discovery: walk a directory tree and keep the files we can process.
//!
//! Eligibility is decided by extension alone (case-insensitive). Content is
//! only inspected later, by the encoder, so an unreadable file shows up as a
//! per-file failure instead of silently vanishing from the run.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What kind of document a file is, judging by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Pdf,
}

impl MediaKind {
    /// Classify a path by extension. `None` means the file is not eligible.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" => Some(MediaKind::Image),
            "pdf" => Some(MediaKind::Pdf),
            _ => None,
        }
    }
}

/// An eligible file found under the input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl InputFile {
    /// Build an `InputFile` for a single path, if its extension is eligible.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = MediaKind::from_path(&path)?;
        Some(Self { path, kind })
    }
}

/// Recursively collect eligible files under `root`.
///
/// Entries are visited in file-name order within each directory so that runs
/// over the same tree always produce rows in the same order. Unreadable
/// subdirectories are logged and skipped. A missing root yields no files.
pub fn discover(root: &Path) -> Vec<InputFile> {
    if !root.exists() {
        warn!("Input directory {} does not exist", root.display());
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(file) = InputFile::from_path(entry.path()) {
            files.push(file);
        }
    }

    debug!("Discovered {} eligible files under {}", files.len(), root.display());
    files
}
