//! PDF processing layer
//!
//! This module provides page rasterization using PDFium.

mod document;

pub use document::Document;
pub(crate) use document::validate_pdf_header;

use crate::error::Result;
use image::DynamicImage;

/// A paged document that can be rasterized one page at a time.
///
/// Index 0 is the blank placeholder page; real content starts at 1.
pub trait PageSource: Send + Sync {
    /// Total number of pages, placeholder included
    fn page_count(&self) -> u32;

    /// Rasterize a page at the given scale factor
    fn render_page(&self, index: u32, scale: f32) -> Result<DynamicImage>;
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| crate::error::Error::ImageEncode {
            reason: e.to_string(),
        })?;
    Ok(png_bytes)
}
