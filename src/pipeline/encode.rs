//! Document encoding: input file → base64 image payload.
//!
//! Image files are sent exactly as stored; their bytes are only sniffed to
//! learn the real MIME type (a PNG renamed to `.jpg` is still labelled
//! `image/png`). PDFs have their first page rendered and encoded as PNG, which
//! is lossless and keeps small print legible for the model.

use crate::error::InvoiceError;
use crate::pipeline::input::{InputFile, MediaKind};
use crate::pipeline::render;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// A still image ready to embed in a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Standard base64 of the image bytes.
    pub data: String,
    pub mime_type: &'static str,
}

impl EncodedPayload {
    /// Convert to the provider crate's image attachment.
    ///
    /// `detail: "high"` lets GPT-4-class models tile the image instead of
    /// reading a single downscaled overview, which loses fine print.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type).with_detail("high")
    }
}

/// Encode an eligible input file.
pub async fn encode_file(
    file: &InputFile,
    max_rendered_pixels: u32,
) -> Result<EncodedPayload, InvoiceError> {
    match file.kind {
        MediaKind::Pdf => {
            let page = render::render_first_page(&file.path, max_rendered_pixels).await?;
            Ok(encode_page(&page)?)
        }
        MediaKind::Image => {
            let bytes = read_file(&file.path).await?;
            encode_image_bytes(&file.path, &bytes)
        }
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, InvoiceError> {
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InvoiceError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            InvoiceError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

/// Base64 raw image bytes after checking they really are an image.
pub fn encode_image_bytes(path: &Path, bytes: &[u8]) -> Result<EncodedPayload, InvoiceError> {
    if bytes.is_empty() {
        return Err(InvoiceError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: "file is empty".into(),
        });
    }

    let format = image::guess_format(bytes).map_err(|e| InvoiceError::UnsupportedFormat {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let data = STANDARD.encode(bytes);
    debug!(
        "Encoded {} ({:?}) → {} bytes base64",
        path.display(),
        format,
        data.len()
    );

    Ok(EncodedPayload {
        data,
        mime_type: format.to_mime_type(),
    })
}

/// Encode a rendered page as a base64 PNG.
pub fn encode_page(img: &DynamicImage) -> Result<EncodedPayload, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let data = STANDARD.encode(&buf);
    debug!("Encoded rendered page → {} bytes base64", data.len());

    Ok(EncodedPayload {
        data,
        mime_type: "image/png",
    })
}
