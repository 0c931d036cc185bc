//! Single-page OCR round trip
//!
//! render page -> temporary PNG -> upload for conversion -> export plain text
//! -> delete remote copy -> clean text. The temporary file is owned by a
//! guard that removes it on every exit path.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ocr::cleanup::clean_text;
use crate::ocr::credentials::{
    Credential, CredentialProvider, StaticProvider, TokenFileProvider,
};
use crate::ocr::drive::{DriveConverter, RemoteConverter};
use crate::ocr::retry::RetryPolicy;
use crate::pdf::PageSource;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Per-page progress checkpoints, in percent
pub mod stage {
    pub const RENDER: u8 = 10;
    pub const UPLOAD: u8 = 40;
    pub const EXPORT: u8 = 70;
    pub const CLEANUP: u8 = 90;
    pub const DONE: u8 = 100;
}

/// Result of recognizing one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OcrOutcome {
    /// Cleaned text
    Text(String),
    /// Human-readable failure reason
    Failed(String),
}

impl OcrOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OcrOutcome::Text(_))
    }

    /// Text stored for the page: the recognized text, or the failure message
    pub fn page_text(&self) -> String {
        match self {
            OcrOutcome::Text(text) => text.clone(),
            OcrOutcome::Failed(reason) => format!("OCR failed: {}", reason),
        }
    }
}

/// Runs the page round trip against a remote converter
pub struct Orchestrator {
    converter: Arc<dyn RemoteConverter>,
    credentials: Arc<dyn CredentialProvider>,
    retry: RetryPolicy,
    render_scale: f32,
    temp_dir: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        converter: Arc<dyn RemoteConverter>,
        credentials: Arc<dyn CredentialProvider>,
        retry: RetryPolicy,
        render_scale: f32,
    ) -> Self {
        Self {
            converter,
            credentials,
            retry,
            render_scale,
            temp_dir: None,
        }
    }

    /// Wire up the Drive converter and a credential provider from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = DriveConverter::http_client(config.http_timeout)?;

        let credentials: Arc<dyn CredentialProvider> = match &config.access_token {
            Some(token) => Arc::new(StaticProvider::new(token.clone())),
            None => Arc::new(TokenFileProvider::new(
                &config.token_file,
                &config.client_secret_file,
                http.clone(),
            )),
        };
        let converter = Arc::new(DriveConverter::new(http, config.drive_api_base.clone()));

        Ok(Self::new(
            converter,
            credentials,
            RetryPolicy::new(config.max_attempts, config.retry_delay),
            config.ocr_render_scale,
        ))
    }

    /// Place temporary images in `dir` instead of the system temp directory
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Recognize one page, turning any error into [`OcrOutcome::Failed`]
    pub async fn run_page(
        &self,
        pages: Arc<dyn PageSource>,
        page: u32,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> OcrOutcome {
        let outcome = match self.extract_text(pages, page, progress).await {
            Ok(text) => OcrOutcome::Text(text),
            Err(e) => {
                tracing::warn!(page, error = %e, "page OCR failed");
                OcrOutcome::Failed(e.client_message())
            }
        };
        progress(stage::DONE);
        outcome
    }

    /// Recognize one page and return its cleaned text
    pub async fn extract_text(
        &self,
        pages: Arc<dyn PageSource>,
        page: u32,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String> {
        // Retries replay the upload and export stages; only forward new highs
        let reported = AtomicU8::new(0);
        let progress = &|p: u8| {
            if reported.fetch_max(p, Ordering::Relaxed) < p {
                progress(p);
            }
        };

        let credential = self.credentials.credential().await?;

        progress(stage::RENDER);
        let scale = self.render_scale;
        let temp_dir = self.temp_dir.clone();
        let image_file = tokio::task::spawn_blocking(move || {
            let image = pages.render_page(page, scale)?;

            let mut builder = tempfile::Builder::new();
            builder.prefix("ocr-page-").suffix(".png");
            let mut file = match temp_dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            };
            image
                .write_to(&mut file, image::ImageFormat::Png)
                .map_err(|e| Error::ImageEncode {
                    reason: e.to_string(),
                })?;
            file.flush()?;
            Ok::<_, Error>(file)
        })
        .await
        .map_err(|e| Error::TaskJoin {
            reason: e.to_string(),
        })??;

        let png = tokio::fs::read(image_file.path()).await?;
        tracing::debug!(page, bytes = png.len(), path = %image_file.path().display(), "page image written");

        let name = format!("page-{}.png", page);
        let credential = &credential;
        let name = name.as_str();
        let bytes = self
            .retry
            .run("page conversion", move |_attempt| {
                let png = png.clone();
                self.round_trip(credential, name, png, progress)
            })
            .await?;
        drop(image_file);

        let text = String::from_utf8(bytes).map_err(|e| Error::RemoteService {
            reason: format!("export is not valid UTF-8: {}", e),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        progress(stage::CLEANUP);
        let cleaned = clean_text(text);
        tracing::info!(page, chars = cleaned.len(), "page recognized");
        Ok(cleaned)
    }

    /// One upload/export/delete attempt. Once the upload succeeded the remote
    /// file is deleted even if the export failed.
    async fn round_trip(
        &self,
        credential: &Credential,
        name: &str,
        png: Vec<u8>,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<Vec<u8>> {
        progress(stage::UPLOAD);
        let file = self.converter.upload(credential, name, png).await?;

        progress(stage::EXPORT);
        let exported = self.converter.export_text(credential, &file).await;
        let deleted = self.converter.delete(credential, &file).await;

        match (exported, deleted) {
            (Ok(bytes), Ok(())) => Ok(bytes),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(delete_err)) => {
                tracing::warn!(file_id = %file.id, error = %delete_err, "remote file left behind");
                Err(e)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingCredentials, FakeConverter};
    use super::*;
    use crate::pdf::testing::FakePages;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn orchestrator(converter: Arc<FakeConverter>, dir: &std::path::Path) -> Orchestrator {
        Orchestrator::new(
            converter,
            Arc::new(StaticProvider::new("token")),
            RetryPolicy::new(3, Duration::ZERO),
            1.0,
        )
        .with_temp_dir(dir)
    }

    fn pages(n: u32) -> Arc<dyn PageSource> {
        Arc::new(FakePages { pages: n })
    }

    fn no_progress(_: u8) {}

    fn temp_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_extract_text_cleans_export() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("\u{feff}( hello ,world ) .end\r\n"));
        let orch = orchestrator(converter.clone(), dir.path());

        let text = orch.extract_text(pages(3), 1, &no_progress).await.unwrap();

        assert_eq!(text, "(hello, world). end");
        assert_eq!(*converter.uploads.lock(), vec!["page-1.png".to_string()]);
        assert_eq!(converter.deletes.lock().len(), 1);
        assert!(converter.live.lock().is_empty());
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("done"));
        *converter.export_failures_left.lock() = 2;
        let orch = orchestrator(converter.clone(), dir.path());

        let outcome = orch.run_page(pages(2), 1, &no_progress).await;

        assert_eq!(outcome, OcrOutcome::Text("done".to_string()));
        assert_eq!(converter.uploads.lock().len(), 3);
        assert_eq!(converter.deletes.lock().len(), 3);
        assert!(converter.live.lock().is_empty());
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_three_failures_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("never"));
        *converter.export_failures_left.lock() = 3;
        let orch = orchestrator(converter.clone(), dir.path());

        let result = orch.extract_text(pages(2), 1, &no_progress).await;

        assert!(matches!(result, Err(Error::RemoteService { .. })));
        assert_eq!(converter.uploads.lock().len(), 3);
        assert!(converter.live.lock().is_empty());
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("never"));
        *converter.export_failures_left.lock() = 3;
        let orch = orchestrator(converter, dir.path());

        let outcome = orch.run_page(pages(2), 1, &no_progress).await;

        assert!(!outcome.is_success());
        assert_eq!(
            outcome.page_text(),
            "OCR failed: Remote service error: export returned 503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_credential_failure_skips_remote_calls() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("never"));
        let orch = Orchestrator::new(
            converter.clone(),
            Arc::new(FailingCredentials),
            RetryPolicy::new(3, Duration::ZERO),
            1.0,
        )
        .with_temp_dir(dir.path());

        let outcome = orch.run_page(pages(2), 1, &no_progress).await;

        assert_eq!(
            outcome,
            OcrOutcome::Failed("Credential error: no authorized token".to_string())
        );
        assert!(converter.uploads.lock().is_empty());
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_render_failure_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("never"));
        let orch = orchestrator(converter.clone(), dir.path());

        let result = orch.extract_text(pages(2), 7, &no_progress).await;

        assert!(matches!(result, Err(Error::PageOutOfBounds { page: 7, .. })));
        assert!(converter.uploads.lock().is_empty());
        assert_eq!(temp_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::default());
        *converter.reply.lock() = vec![b'o', b'k', 0xff, 0xfe];
        let orch = orchestrator(converter.clone(), dir.path());

        let result = orch.extract_text(pages(2), 1, &no_progress).await;

        assert!(matches!(result, Err(Error::RemoteService { .. })));
        assert!(converter.live.lock().is_empty());
    }

    #[tokio::test]
    async fn test_empty_export_yields_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::default());
        let orch = orchestrator(converter, dir.path());

        let text = orch.extract_text(pages(2), 1, &no_progress).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_progress_does_not_repeat_stages_on_retry() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("ok"));
        *converter.export_failures_left.lock() = 1;
        let orch = orchestrator(converter.clone(), dir.path());
        let seen = Mutex::new(Vec::new());

        let outcome = orch.run_page(pages(2), 1, &|p| seen.lock().push(p)).await;

        assert!(outcome.is_success());
        assert_eq!(converter.uploads.lock().len(), 2);
        let seen = seen.into_inner();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
        assert_eq!(
            seen,
            vec![
                stage::RENDER,
                stage::UPLOAD,
                stage::EXPORT,
                stage::CLEANUP,
                stage::DONE
            ]
        );
    }

    #[tokio::test]
    async fn test_progress_reaches_done_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("ok"));
        let orch = orchestrator(converter, dir.path());
        let seen = Mutex::new(Vec::new());

        orch.run_page(pages(2), 1, &|p| seen.lock().push(p)).await;

        let seen = seen.into_inner();
        assert_eq!(
            seen,
            vec![
                stage::RENDER,
                stage::UPLOAD,
                stage::EXPORT,
                stage::CLEANUP,
                stage::DONE
            ]
        );
    }
}
