//! Error types for PDF OCR Studio

use thiserror::Error;

/// Result type alias for PDF OCR Studio
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PDF OCR Studio
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// PDF is password protected
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// No document is open
    #[error("No project to save. Please open a PDF first.")]
    NoDocument,

    /// No page text to export
    #[error("No results to save. Please perform OCR first.")]
    NothingToExport,

    /// A save was requested without a remembered project path
    #[error("No project path set; use save as")]
    NoProjectPath,

    /// Another page is already being recognized
    #[error("OCR already running for page {page}")]
    OcrInProgress { page: u32 },

    /// Project file could not be interpreted
    #[error("Invalid project file: {reason}")]
    InvalidProject { reason: String },

    /// Credential acquisition failed
    #[error("Credential error: {reason}")]
    Credential { reason: String },

    /// Remote conversion service failed
    #[error("Remote service error: {reason}")]
    RemoteService { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Image encoding error
    #[error("Image encoding failed: {reason}")]
    ImageEncode { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background task failed to complete
    #[error("Task join error: {reason}")]
    TaskJoin { reason: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::NoDocument => "No project to save. Please open a PDF first.".to_string(),
            Error::NothingToExport => "No results to save. Please perform OCR first.".to_string(),
            Error::NoProjectPath => "No project path set; use save as".to_string(),
            Error::OcrInProgress { page } => format!("OCR already running for page {}", page),
            Error::InvalidProject { .. } => "Invalid project file".to_string(),
            Error::Credential { reason } => format!("Credential error: {}", reason),
            Error::RemoteService { reason } => format!("Remote service error: {}", reason),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::ImageEncode { .. } => "Image encoding failed".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::TaskJoin { .. } => "Background task failed".to_string(),
        }
    }
}
