//! MCP Server implementation using rmcp
//!
//! Every studio action is one tool. Tools return pretty-printed JSON; a
//! failed action carries an `error` field instead of its result.

use crate::app::{App, SharedApp};
use crate::config::AppConfig;
use crate::ocr::{
    begin_full_document, continue_full_document, run_single_page, Orchestrator,
};
use crate::pdf::Document;
use crate::project;
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// MCP server exposing the OCR studio
#[derive(Clone)]
pub struct OcrServer {
    app: SharedApp,
    orchestrator: Arc<Orchestrator>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PathParams {
    /// File path (absolute or relative to the server's working directory)
    pub path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ShowPageParams {
    /// Page index; 0 is the blank placeholder, 1..N-1 are the document's pages
    pub page: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditTextParams {
    /// New text for the current page
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PageParams {
    /// Page index (defaults to the current page)
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ZoomParams {
    /// Wheel delta; positive zooms in by 1.25x, zero or negative zooms out by 0.8x
    pub delta: i32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SaveProjectParams {
    /// Target path ("save as"); omit to save to the remembered project path
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentResult {
    /// Pages of the source PDF (placeholder excluded)
    pub pages: u32,
    pub current_page: u32,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PageTextResult {
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PathResult {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct BatchStarted {
    pub started: bool,
    pub pages: u32,
}

/// Serialize a tool outcome, logging and sanitizing failures
fn respond<T: Serialize>(tool: &str, result: crate::error::Result<T>) -> String {
    let value = match result {
        Ok(value) => serde_json::to_value(&value).unwrap_or_default(),
        Err(e) => {
            tracing::warn!(tool, error = %e, "tool failed");
            serde_json::json!({ "error": e.client_message() })
        }
    };
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

fn join_error(e: tokio::task::JoinError) -> crate::error::Error {
    crate::error::Error::TaskJoin {
        reason: e.to_string(),
    }
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl OcrServer {
    pub fn new(app: App, orchestrator: Orchestrator) -> Self {
        Self {
            app: Arc::new(tokio::sync::Mutex::new(app)),
            orchestrator: Arc::new(orchestrator),
            tool_router: Self::tool_router(),
        }
    }

    /// Create a server with a fresh application state and the Drive converter
    pub fn with_config(config: AppConfig) -> crate::error::Result<Self> {
        let orchestrator = Orchestrator::from_config(&config)?;
        Ok(Self::new(App::new(Arc::new(config)), orchestrator))
    }

    pub fn app(&self) -> &SharedApp {
        &self.app
    }

    /// Open a PDF as a new project
    #[tool(
        description = "Open a PDF file as a new project. A blank placeholder page is inserted as page 0; the document's pages are 1..N. Any unsaved text is discarded."
    )]
    async fn open_pdf(&self, Parameters(params): Parameters<PathParams>) -> String {
        respond("open_pdf", self.process_open_pdf(params.path).await)
    }

    /// Clear the current project
    #[tool(description = "Start a new empty project: closes the document and clears all page text.")]
    async fn new_project(&self) -> String {
        let mut app = self.app.lock().await;
        let result = app.new_project().map(|()| app.status_line());
        respond("new_project", result.map(|status| serde_json::json!({ "status": status })))
    }

    /// Switch the viewed page
    #[tool(
        description = "Show a page. Text typed for the previous page is kept, and the stored text of the new page is returned."
    )]
    async fn show_page(&self, Parameters(params): Parameters<ShowPageParams>) -> String {
        let mut app = self.app.lock().await;
        let result = app.show_page(params.page).map(|text| PageTextResult {
            page: params.page,
            text: text.to_string(),
        });
        respond("show_page", result)
    }

    /// Replace the text of the current page
    #[tool(description = "Replace the text of the current page.")]
    async fn edit_text(&self, Parameters(params): Parameters<EditTextParams>) -> String {
        let mut app = self.app.lock().await;
        let result = app.edit_text(params.text).map(|()| PageTextResult {
            page: app.current_page(),
            text: app.current_text().to_string(),
        });
        respond("edit_text", result)
    }

    /// Read stored page text
    #[tool(description = "Get the stored text of a page (defaults to the current page).")]
    async fn get_text(&self, Parameters(params): Parameters<PageParams>) -> String {
        let app = self.app.lock().await;
        let page = params.page.unwrap_or_else(|| app.current_page());
        respond("get_text", app.page_text(page).map(|text| PageTextResult {
            page,
            text: text.to_string(),
        }))
    }

    /// Render the current page as PNG
    #[tool(
        description = "Render the current page as a base64 PNG image, together with the current zoom factor."
    )]
    async fn render_page(&self) -> String {
        respond("render_page", self.process_render_page().await)
    }

    /// Apply a wheel zoom event
    #[tool(
        description = "Zoom the page view like a mouse wheel: positive delta multiplies the zoom by 1.25, otherwise by 0.8."
    )]
    async fn zoom(&self, Parameters(params): Parameters<ZoomParams>) -> String {
        let zoom = self.app.lock().await.zoom(params.delta);
        respond("zoom", Ok(serde_json::json!({ "zoom": zoom })))
    }

    /// OCR one page
    #[tool(
        description = "Run OCR on one page (defaults to the current page) and wait for the result. The recognized text, or an \"OCR failed: ...\" message, replaces the page's text."
    )]
    async fn ocr_page(&self, Parameters(params): Parameters<PageParams>) -> String {
        let result = run_single_page(&self.app, self.orchestrator.clone(), params.page).await;
        respond("ocr_page", result)
    }

    /// OCR the whole document in the background
    #[tool(
        description = "Start OCR of every page in order, in the background. Existing page text is cleared first. Poll ocr_status for progress."
    )]
    async fn ocr_all(&self) -> String {
        respond("ocr_all", self.process_ocr_all().await)
    }

    /// Report OCR progress
    #[tool(description = "Report the running page, progress percent and full-document run state.")]
    async fn ocr_status(&self) -> String {
        let status = self.app.lock().await.ocr_status();
        respond("ocr_status", Ok(status))
    }

    /// Save the project
    #[tool(
        description = "Save the project (PDF and all page text) to a .rexmi file. With a path this is \"save as\"; without, the last project path is reused."
    )]
    async fn save_project(&self, Parameters(params): Parameters<SaveProjectParams>) -> String {
        let mut app = self.app.lock().await;
        let path = params.path.map(PathBuf::from);
        let result = app.save_project(path.as_deref()).map(|saved| PathResult {
            path: saved.display().to_string(),
        });
        respond("save_project", result)
    }

    /// Load a project
    #[tool(description = "Load a .rexmi project file, replacing the open project.")]
    async fn load_project(&self, Parameters(params): Parameters<PathParams>) -> String {
        respond("load_project", self.process_load_project(params.path).await)
    }

    /// Export page text
    #[tool(
        description = "Write the text of all pages, in page order, to a plain-text file."
    )]
    async fn export_text(&self, Parameters(params): Parameters<PathParams>) -> String {
        let mut app = self.app.lock().await;
        let result = app.export_text(&params.path).map(|()| PathResult { path: params.path });
        respond("export_text", result)
    }

    /// Show the status line
    #[tool(description = "Summary of the open project: page count and project file name.")]
    async fn status(&self) -> String {
        let status = self.app.lock().await.status_line();
        respond("status", Ok(serde_json::json!({ "status": status })))
    }

    // ========================================================================
    // Processing Methods
    // ========================================================================

    async fn process_open_pdf(&self, path: String) -> crate::error::Result<DocumentResult> {
        self.app.lock().await.ensure_idle()?;

        let document = tokio::task::spawn_blocking(move || Document::open(path))
            .await
            .map_err(join_error)??;

        let mut app = self.app.lock().await;
        let pages = app.open_document(document)?;
        tracing::info!(pages, "PDF opened");
        Ok(DocumentResult {
            pages,
            current_page: app.current_page(),
            status: app.status_line(),
        })
    }

    async fn process_load_project(&self, path: String) -> crate::error::Result<DocumentResult> {
        self.app.lock().await.ensure_idle()?;

        let path = PathBuf::from(path);
        let load_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || project::load(load_path))
            .await
            .map_err(join_error)??;

        let mut app = self.app.lock().await;
        let pages = app.open_loaded(loaded, path)?;
        Ok(DocumentResult {
            pages,
            current_page: app.current_page(),
            status: app.status_line(),
        })
    }

    async fn process_render_page(&self) -> crate::error::Result<crate::viewer::RenderedPage> {
        let (viewer, pages) = self.app.lock().await.render_target()?;
        tokio::task::spawn_blocking(move || viewer.render(pages.as_ref()))
            .await
            .map_err(join_error)?
    }

    async fn process_ocr_all(&self) -> crate::error::Result<BatchStarted> {
        let pages = begin_full_document(&self.app).await?;

        let app = self.app.clone();
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(e) = continue_full_document(app, orchestrator, pages).await {
                tracing::warn!(error = %e, "full-document OCR stopped early");
            }
        });

        Ok(BatchStarted {
            started: true,
            pages,
        })
    }
}

#[tool_handler]
impl ServerHandler for OcrServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF OCR studio: open a PDF, OCR pages through Google Drive, correct the text \
                 page by page, then save the project or export the text."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with configuration from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(AppConfig::from_env()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: AppConfig) -> Result<()> {
    let server = OcrServer::with_config(config)?;

    tracing::info!("PDF OCR studio ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
