//! PDF rasterisation: render the first page of a document via pdfium.
//!
//! pdfium is a blocking C++ library with thread-local state, so the work runs
//! inside `tokio::task::spawn_blocking`. The caller still awaits it before
//! doing anything else; moving it off the async worker only keeps the runtime
//! responsive.

use crate::error::InvoiceError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable pointing at an existing pdfium shared library.
pub const PDFIUM_LIB_PATH_VAR: &str = "PDFIUM_LIB_PATH";

/// Render page 1 of `pdf_path`, longest edge capped at `max_pixels`.
pub async fn render_first_page(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<DynamicImage, InvoiceError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || render_first_page_blocking(&path, max_pixels))
        .await
        .map_err(|e| InvoiceError::Internal(format!("Render task panicked: {}", e)))?
}

/// Bind to pdfium: `PDFIUM_LIB_PATH` first, then the working directory, then
/// the system library search path.
fn bind_pdfium() -> Result<Pdfium, InvoiceError> {
    let bindings = match std::env::var(PDFIUM_LIB_PATH_VAR) {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| InvoiceError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of first-page rendering.
fn render_first_page_blocking(
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<DynamicImage, InvoiceError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| InvoiceError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} ({} pages)", pdf_path.display(), total_pages);

    if total_pages == 0 {
        return Err(InvoiceError::EmptyDocument {
            path: pdf_path.to_path_buf(),
        });
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let page = pages
        .get(0)
        .map_err(|e| InvoiceError::RasterisationFailed {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| InvoiceError::RasterisationFailed {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered first page of {} → {}x{} px",
        pdf_path.display(),
        image.width(),
        image.height()
    );

    Ok(image)
}
