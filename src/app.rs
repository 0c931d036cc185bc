//! Application state
//!
//! One [`App`] holds everything the foreground needs: the project, the open
//! document, the viewer and the text panel. OCR jobs never touch it directly;
//! they hand back a [`PageResult`] that is applied with [`App::finish_ocr`].

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ocr::worker::{OcrMonitor, OcrStatus, PageResult};
use crate::pdf::{Document, PageSource};
use crate::project::{self, LoadedProject, PageTextMap, Project};
use crate::viewer::{RenderedPage, Viewer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Application state shared between tool handlers and OCR drivers
pub type SharedApp = Arc<tokio::sync::Mutex<App>>;

pub struct App {
    config: Arc<AppConfig>,
    project: Project,
    pages: Option<Arc<dyn PageSource>>,
    viewer: Viewer,
    /// Text panel contents for the current page
    panel: String,
    in_flight: Option<u32>,
    batch_running: bool,
    monitor: OcrMonitor,
}

impl App {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let viewer = Viewer::new(config.view_render_scale);
        Self {
            config,
            project: Project::default(),
            pages: None,
            viewer,
            panel: String::new(),
            in_flight: None,
            batch_running: false,
            monitor: OcrMonitor::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn monitor(&self) -> OcrMonitor {
        self.monitor.clone()
    }

    pub fn ocr_status(&self) -> OcrStatus {
        self.monitor.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some() || self.batch_running
    }

    /// Fail while a page job or a full-document run is active
    pub fn ensure_idle(&self) -> Result<()> {
        match self.in_flight {
            Some(page) => Err(Error::OcrInProgress { page }),
            None if self.batch_running => Err(Error::OcrInProgress {
                page: self.viewer.current_page(),
            }),
            None => Ok(()),
        }
    }

    fn pages(&self) -> Result<&Arc<dyn PageSource>> {
        self.pages.as_ref().ok_or(Error::NoDocument)
    }

    /// Total pages of the open document, placeholder included
    pub fn page_count(&self) -> Option<u32> {
        self.pages.as_ref().map(|p| p.page_count())
    }

    pub fn current_page(&self) -> u32 {
        self.viewer.current_page()
    }

    pub fn current_text(&self) -> &str {
        &self.panel
    }

    pub fn texts(&self) -> &PageTextMap {
        &self.project.texts
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project.path.as_deref()
    }

    /// Drop the document, text and project path
    pub fn new_project(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.project = Project::default();
        self.pages = None;
        self.viewer.reset();
        self.panel.clear();
        tracing::info!("new project");
        Ok(())
    }

    /// Open a PDF file as a fresh project; returns the number of real pages
    pub fn open_pdf<P: AsRef<Path>>(&mut self, path: P) -> Result<u32> {
        self.ensure_idle()?;
        let document = Document::open(path.as_ref())?;
        let real_pages = self.open_document(document)?;
        tracing::info!(path = %path.as_ref().display(), pages = real_pages, "PDF opened");
        Ok(real_pages)
    }

    /// Install an already opened document as a fresh project
    pub fn open_document(&mut self, document: Document) -> Result<u32> {
        let source = document.source_bytes().to_vec();
        let real_pages = document.real_page_count();
        self.install_document(source, Arc::new(document), PageTextMap::new(), None)?;
        Ok(real_pages)
    }

    /// Replace the open document and show its placeholder page
    pub(crate) fn install_document(
        &mut self,
        source: Vec<u8>,
        pages: Arc<dyn PageSource>,
        texts: PageTextMap,
        path: Option<PathBuf>,
    ) -> Result<()> {
        self.ensure_idle()?;
        self.project = Project {
            source: Some(source),
            texts,
            path,
        };
        self.pages = Some(pages);
        self.viewer.reset();
        self.panel = self.project.texts.get(0).unwrap_or_default().to_string();
        self.flush_panel();
        Ok(())
    }

    /// Save the text panel into the page text map
    fn flush_panel(&mut self) {
        if self.pages.is_some() {
            let page = self.viewer.current_page();
            self.project.texts.set(page, self.panel.clone());
        }
    }

    /// Switch pages, keeping any edit made to the page being left
    pub fn show_page(&mut self, page: u32) -> Result<&str> {
        let page_count = self.pages()?.page_count();
        if page >= page_count {
            return Err(Error::PageOutOfBounds {
                page,
                total: page_count,
            });
        }

        self.flush_panel();
        self.viewer.go_to(page, page_count)?;

        match self.project.texts.get(page) {
            Some(text) => {
                self.panel = text.to_string();
                tracing::debug!(page, "text found for page");
            }
            None => {
                self.panel.clear();
                tracing::debug!(page, "no text for page");
            }
        }
        self.flush_panel();
        Ok(&self.panel)
    }

    /// Replace the text of the current page
    pub fn edit_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.pages()?;
        self.panel = text.into();
        self.flush_panel();
        Ok(())
    }

    /// Stored text of `page`; for the current page this is the text panel
    pub fn page_text(&self, page: u32) -> Result<&str> {
        let total = self.pages()?.page_count();
        if page >= total {
            return Err(Error::PageOutOfBounds { page, total });
        }
        if page == self.viewer.current_page() {
            Ok(&self.panel)
        } else {
            Ok(self.project.texts.get(page).unwrap_or_default())
        }
    }

    /// Render the current page for display
    pub fn render_current(&self) -> Result<RenderedPage> {
        let pages = self.pages()?;
        self.viewer.render(pages.as_ref())
    }

    /// Viewer state and page source, for rendering off the lock
    pub fn render_target(&self) -> Result<(Viewer, Arc<dyn PageSource>)> {
        Ok((self.viewer.clone(), self.pages()?.clone()))
    }

    /// Apply a wheel event to the viewer zoom
    pub fn zoom(&mut self, delta: i32) -> f64 {
        self.viewer.wheel(delta)
    }

    /// Reserve the OCR slot for a single page request
    pub fn start_page_ocr(&mut self, page: u32) -> Result<Arc<dyn PageSource>> {
        self.ensure_idle()?;
        self.begin_ocr(page)
    }

    /// Reserve the OCR slot for `page`; at most one page is in flight
    pub(crate) fn begin_ocr(&mut self, page: u32) -> Result<Arc<dyn PageSource>> {
        if let Some(running) = self.in_flight {
            return Err(Error::OcrInProgress { page: running });
        }
        let pages = self.pages()?.clone();
        let total = pages.page_count();
        if page >= total {
            return Err(Error::PageOutOfBounds { page, total });
        }

        self.in_flight = Some(page);
        self.monitor.page_started(page);
        Ok(pages)
    }

    /// Apply a finished page job
    pub fn finish_ocr(&mut self, result: &PageResult) {
        if self.in_flight == Some(result.page) {
            self.in_flight = None;
        }
        self.monitor.page_finished(result);

        if self.pages.is_none() {
            return;
        }
        let text = result.outcome.page_text();
        if result.page == self.viewer.current_page() {
            self.panel = text.clone();
        }
        self.project.texts.set(result.page, text);
    }

    /// Prepare a full-document run; returns the number of real pages
    pub(crate) fn begin_batch(&mut self) -> Result<u32> {
        self.ensure_idle()?;
        let total = self.pages()?.page_count().saturating_sub(1);

        self.project.texts.clear();
        self.panel.clear();
        self.viewer.go_to(0, total + 1)?;
        self.batch_running = true;
        self.monitor.batch_started(total);
        Ok(total)
    }

    pub(crate) fn end_batch(&mut self) {
        self.batch_running = false;
        self.in_flight = None;
        self.monitor.batch_finished();
    }

    /// Save the project. With `path` this is "save as": the project extension
    /// is added when missing and the path is remembered.
    pub fn save_project(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        if self.project.source.is_none() {
            return Err(Error::NoDocument);
        }
        let target = match path {
            Some(p) => project::with_project_extension(p),
            None => self.project.path.clone().ok_or(Error::NoProjectPath)?,
        };

        self.flush_panel();
        let source = self.project.source.as_deref().ok_or(Error::NoDocument)?;
        project::save(&target, source, &self.project.texts)?;

        self.project.path = Some(target.clone());
        Ok(target)
    }

    /// Load a project file, replacing the open document
    pub fn load_project<P: AsRef<Path>>(&mut self, path: P) -> Result<u32> {
        self.ensure_idle()?;
        let path = path.as_ref();
        let loaded = project::load(path)?;
        self.open_loaded(loaded, path.to_path_buf())
    }

    /// Install a project read from `path`
    pub fn open_loaded(&mut self, loaded: LoadedProject, path: PathBuf) -> Result<u32> {
        let source = loaded.document.source_bytes().to_vec();
        let real_pages = loaded.document.real_page_count();
        self.install_document(source, Arc::new(loaded.document), loaded.texts, Some(path))?;
        Ok(real_pages)
    }

    /// Write all page texts to a plain-text file
    pub fn export_text<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.flush_panel();
        project::export_text(path, &self.project.texts)
    }

    /// One-line summary of the open project
    pub fn status_line(&self) -> String {
        let mut line = "OCR Application | ".to_string();
        if let Some(count) = self.page_count() {
            line.push_str(&format!("PDF Pages: {} | ", count));
        }
        match self.project.file_name() {
            Some(name) => line.push_str(&format!("Project: {}", name)),
            None => line.push_str("No project loaded"),
        }
        line
    }
}
