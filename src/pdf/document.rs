//! PDF document wrapper for PDFium
//!
//! A [`Document`] keeps the original file bytes (what gets embedded in a
//! project) next to a padded copy that carries a blank placeholder page in
//! front of the real content. Page indices always refer to the padded copy,
//! so index 0 is the placeholder and real pages start at 1.

use crate::error::{Error, Result};
use crate::pdf::PageSource;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Map PDFium errors to our error type
fn map_pdfium_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::Pdfium {
            reason: format!("{}", err),
        },
    }
}

/// Check for the `%PDF` header
pub(crate) fn validate_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// An opened PDF with a synthetic blank first page
#[derive(Debug, Clone)]
pub struct Document {
    source: Vec<u8>,
    padded: Vec<u8>,
    page_count: u32,
}

impl Document {
    /// Open a PDF from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(Error::PdfNotFound {
                path: path.display().to_string(),
            });
        }

        let data = std::fs::read(path)?;
        Self::open_bytes(data)
    }

    /// Open a PDF from bytes, prepending the placeholder page
    pub fn open_bytes(data: Vec<u8>) -> Result<Self> {
        validate_pdf_header(&data)?;

        let pdfium = create_pdfium()?;
        let mut document = pdfium
            .load_pdf_from_byte_slice(&data, None)
            .map_err(map_pdfium_error)?;

        let (width, height) = {
            let pages = document.pages();
            if pages.len() == 0 {
                return Err(Error::InvalidPdf {
                    reason: "PDF has no pages".to_string(),
                });
            }
            let first = pages.get(0).map_err(map_pdfium_error)?;
            (first.width(), first.height())
        };

        document
            .pages_mut()
            .create_page_at_start(PdfPagePaperSize::Custom(width, height))
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to insert placeholder page: {}", e),
            })?;

        let page_count = document.pages().len() as u32;
        let padded = document.save_to_bytes().map_err(|e| Error::Pdfium {
            reason: format!("Failed to save padded PDF: {}", e),
        })?;
        drop(document);

        tracing::debug!(page_count, "opened document with placeholder page");

        Ok(Self {
            source: data,
            padded,
            page_count,
        })
    }

    /// Original file bytes, without the placeholder page
    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    /// Number of real (non-placeholder) pages
    pub fn real_page_count(&self) -> u32 {
        self.page_count.saturating_sub(1)
    }
}

impl PageSource for Document {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn render_page(&self, index: u32, scale: f32) -> Result<DynamicImage> {
        if index >= self.page_count {
            return Err(Error::PageOutOfBounds {
                page: index,
                total: self.page_count,
            });
        }

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.padded, None)
            .map_err(map_pdfium_error)?;

        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", index, e),
            })?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to render page {}: {}", index, e),
            })?;

        Ok(bitmap.as_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_detection() {
        let result = Document::open_bytes(b"not a pdf".to_vec());
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_open_nonexistent_file() {
        let result = Document::open("/nonexistent/path/file.pdf");
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_header_validation() {
        assert!(validate_pdf_header(b"%PDF-1.7\n").is_ok());
        assert!(validate_pdf_header(b"%PD").is_err());
        assert!(validate_pdf_header(b"").is_err());
    }
}
