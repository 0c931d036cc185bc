//! PDF OCR Studio Library
//!
//! Open a PDF, OCR its pages through a remote document converter (Google
//! Drive), correct the text page by page and keep everything in a single
//! project file. The studio is driven over MCP:
//! - `open_pdf` / `load_project`: load a document
//! - `show_page` / `edit_text` / `render_page` / `zoom`: view and correct
//! - `ocr_page` / `ocr_all` / `ocr_status`: recognize pages
//! - `save_project` / `export_text`: persist results

pub mod app;
pub mod config;
pub mod error;
pub mod ocr;
pub mod pdf;
pub mod project;
pub mod server;
pub mod viewer;

pub use app::{App, SharedApp};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use ocr::clean_text;
pub use project::PageTextMap;
pub use server::{run_server, run_server_with_config, OcrServer};
