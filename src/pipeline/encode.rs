//! Image encoding for the two consumers of a rendered page.
//!
//! * The deck embeds each page as a JPEG: rendered pages are photographs of
//!   text and graphics, and JPEG keeps a 40-page deck to a few megabytes.
//! * The model receives the same JPEG as a base64 [`ImageData`]; `detail: "high"`
//!   asks GPT-4-class models for full tiling so small print stays readable.

use crate::model::{ImageEncoding, PageImage};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

/// Encode a rasterised page as JPEG at `quality` (1–100).
///
/// Alpha is dropped: PDF pages are rendered onto an opaque background.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<PageImage, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?;

    debug!(
        "Encoded {}x{} page → {} bytes JPEG",
        rgb.width(),
        rgb.height(),
        buf.len()
    );

    Ok(PageImage {
        data: Arc::from(buf),
        encoding: ImageEncoding::Jpeg,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Wrap an encoded page as a base64 attachment for the model.
pub fn to_image_data(page: &PageImage) -> ImageData {
    let b64 = STANDARD.encode(&page.data);
    ImageData::new(b64, page.encoding.mime_type()).with_detail("high")
}
