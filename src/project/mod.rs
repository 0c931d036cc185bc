//! Project model and persistence

pub mod store;
mod texts;

pub use store::{export_text, load, read, save, with_project_extension, LoadedProject};
pub use texts::PageTextMap;

use std::path::PathBuf;

/// Embedded PDF bytes, per-page text and the path the project was last saved to
#[derive(Debug, Default)]
pub struct Project {
    /// Original PDF bytes (no placeholder page)
    pub source: Option<Vec<u8>>,
    pub texts: PageTextMap,
    pub path: Option<PathBuf>,
}

impl Project {
    /// File name of the saved project, if any
    pub fn file_name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
    }
}
