//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements exactly one step, so each can be tested alone.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm
//! (walk)    (pdfium)   (base64)   (VLM)
//! ```
//!
//! 1. [`input`]: walk the input tree and keep `.jpg/.jpeg/.png/.pdf` files
//! 2. [`render`]: rasterise the first page of a PDF; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`encode`]: base64-wrap the image bytes for the multimodal request body
//! 4. [`llm`]: the [`llm::VisionModel`] seam and its `edgequake-llm`
//!    implementation; the only stage with network I/O

pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
