//! Project persistence: JSON file with the embedded PDF and per-page text

use crate::config::PROJECT_EXTENSION;
use crate::error::{Error, Result};
use crate::pdf::{validate_pdf_header, Document};
use crate::project::PageTextMap;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk project layout
#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
    /// Base64 of the original PDF bytes
    pdf_content: String,
    /// Page index (decimal string) to text
    ocr_results: PageTextMap,
}

/// A project read back from disk with its document opened
pub struct LoadedProject {
    pub document: Document,
    pub texts: PageTextMap,
}

/// Write a project file, overwriting whatever is at `path`
pub fn save<P: AsRef<Path>>(path: P, source: &[u8], texts: &PageTextMap) -> Result<()> {
    let path = path.as_ref();
    let file = ProjectFile {
        pdf_content: base64::engine::general_purpose::STANDARD.encode(source),
        ocr_results: texts.clone(),
    };

    let json = serde_json::to_vec(&file)?;
    std::fs::write(path, json)?;

    tracing::info!(path = %path.display(), pages = texts.len(), "project saved");
    Ok(())
}

/// Read a project file without opening the embedded document
pub fn read<P: AsRef<Path>>(path: P) -> Result<(Vec<u8>, PageTextMap)> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::InvalidProject {
            reason: format!("{} does not exist", path.display()),
        });
    }

    let raw = std::fs::read(path)?;
    let file: ProjectFile = serde_json::from_slice(&raw).map_err(|e| Error::InvalidProject {
        reason: e.to_string(),
    })?;

    let source = base64::engine::general_purpose::STANDARD.decode(file.pdf_content.as_bytes())?;
    validate_pdf_header(&source)?;

    Ok((source, file.ocr_results))
}

/// Read a project file and open its embedded document.
///
/// The document goes through a temporary `.pdf` file and the regular
/// [`Document::open`] path, so it gets the same placeholder page as a freshly
/// opened PDF. Stored text for pages the document does not have is dropped.
pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadedProject> {
    let path = path.as_ref();
    let (source, mut texts) = read(path)?;

    let mut temp = tempfile::Builder::new().suffix(".pdf").tempfile()?;
    temp.write_all(&source)?;
    temp.flush()?;

    let document = Document::open(temp.path())?;

    let dropped = texts.retain_valid(crate::pdf::PageSource::page_count(&document));
    if !dropped.is_empty() {
        tracing::warn!(?dropped, "project text refers to pages outside the document");
    }

    tracing::info!(path = %path.display(), pages = texts.len(), "project loaded");
    Ok(LoadedProject { document, texts })
}

/// Write all page texts to a plain-text file in ascending page order
pub fn export_text<P: AsRef<Path>>(path: P, texts: &PageTextMap) -> Result<()> {
    if texts.is_empty() {
        return Err(Error::NothingToExport);
    }
    let path = path.as_ref();
    std::fs::write(path, texts.joined())?;

    tracing::info!(path = %path.display(), pages = texts.len(), "text exported");
    Ok(())
}

/// Append the project extension unless the path already has it
pub fn with_project_extension<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    match path.extension() {
        Some(ext) if ext == PROJECT_EXTENSION => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".");
            name.push(PROJECT_EXTENSION);
            PathBuf::from(name)
        }
    }
}
