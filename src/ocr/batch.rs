//! Sequential full-document OCR
//!
//! Pages 1..N-1 are recognized strictly one after another: the next page is
//! dispatched only after the previous page's result has been applied.

use crate::app::SharedApp;
use crate::error::Result;
use crate::ocr::orchestrator::Orchestrator;
use crate::ocr::worker::{await_completion, spawn_page_job, OcrMonitor};
use serde::Serialize;
use std::sync::Arc;

/// Overall batch progress in percent
pub fn overall_progress(pages_completed: u32, current_page_progress: u8, total_pages: u32) -> u8 {
    if total_pages == 0 {
        return 100;
    }
    let value = (pages_completed as u64 * 100 + current_page_progress as u64) / total_pages as u64;
    value.min(100) as u8
}

/// Outcome of a full-document run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Real pages processed
    pub pages: u32,
    /// Pages whose recognition failed
    pub failed: Vec<u32>,
}

/// Recognize every real page of the open document.
///
/// Stored page text is cleared first. A failed page keeps its failure text
/// and the run moves on to the next page.
pub async fn run_full_document(
    app: SharedApp,
    orchestrator: Arc<Orchestrator>,
) -> Result<BatchSummary> {
    let total = begin_full_document(&app).await?;
    continue_full_document(app, orchestrator, total).await
}

/// Reserve the application for a full-document run and clear stored text.
///
/// Returns the number of real pages. Once this succeeds the batch state is
/// `Running` and [`continue_full_document`] must follow.
pub async fn begin_full_document(app: &SharedApp) -> Result<u32> {
    let total = app.lock().await.begin_batch()?;
    tracing::info!(pages = total, "full-document OCR started");
    Ok(total)
}

/// Recognize pages `1..=total` of a run started by [`begin_full_document`]
pub async fn continue_full_document(
    app: SharedApp,
    orchestrator: Arc<Orchestrator>,
    total: u32,
) -> Result<BatchSummary> {
    let monitor = app.lock().await.monitor();
    let result = drive_pages(&app, orchestrator, total, &monitor).await;

    app.lock().await.end_batch();
    match &result {
        Ok(summary) => tracing::info!(
            pages = summary.pages,
            failed = summary.failed.len(),
            "full-document OCR complete"
        ),
        Err(e) => tracing::warn!(error = %e, "full-document OCR stopped"),
    }
    result
}

async fn drive_pages(
    app: &SharedApp,
    orchestrator: Arc<Orchestrator>,
    total: u32,
    monitor: &OcrMonitor,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for (completed, page) in (1..=total).enumerate() {
        let completed = completed as u32;
        let pages = {
            let mut app = app.lock().await;
            app.show_page(page)?;
            app.begin_ocr(page)?
        };

        let page_monitor = monitor.clone();
        let progress = Arc::new(move |p: u8| {
            page_monitor.set_progress(overall_progress(completed, p, total))
        });

        let rx = spawn_page_job(orchestrator.clone(), pages, page, progress);
        let result = await_completion(page, rx).await;

        if !result.outcome.is_success() {
            summary.failed.push(page);
        }
        summary.pages += 1;
        app.lock().await.finish_ocr(&result);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::config::AppConfig;
    use crate::ocr::credentials::StaticProvider;
    use crate::ocr::orchestrator::testing::FakeConverter;
    use crate::ocr::retry::RetryPolicy;
    use crate::ocr::worker::BatchState;
    use crate::pdf::testing::FakePages;
    use crate::project::PageTextMap;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case(0, 0, 4, 0)]
    #[case(0, 100, 4, 25)]
    #[case(1, 50, 4, 37)]
    #[case(3, 100, 4, 100)]
    #[case(5, 100, 4, 100)]
    #[case(0, 50, 0, 100)]
    fn test_overall_progress(
        #[case] completed: u32,
        #[case] current: u8,
        #[case] total: u32,
        #[case] expected: u8,
    ) {
        assert_eq!(overall_progress(completed, current, total), expected);
    }

    fn shared_app(pages: u32) -> SharedApp {
        let mut app = App::new(Arc::new(AppConfig::default()));
        app.install_document(
            b"%PDF-1.4".to_vec(),
            Arc::new(FakePages { pages }),
            PageTextMap::new(),
            None,
        )
        .unwrap();
        Arc::new(tokio::sync::Mutex::new(app))
    }

    fn orchestrator(converter: Arc<FakeConverter>, dir: &std::path::Path) -> Arc<Orchestrator> {
        Arc::new(
            Orchestrator::new(
                converter,
                Arc::new(StaticProvider::new("token")),
                RetryPolicy::new(1, Duration::ZERO),
                1.0,
            )
            .with_temp_dir(dir),
        )
    }

    #[tokio::test]
    async fn test_runs_every_real_page_once() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("text"));
        let app = shared_app(4);

        let summary = run_full_document(app.clone(), orchestrator(converter.clone(), dir.path()))
            .await
            .unwrap();

        assert_eq!(summary, BatchSummary { pages: 3, failed: vec![] });
        assert_eq!(
            *converter.uploads.lock(),
            vec!["page-1.png", "page-2.png", "page-3.png"]
        );

        let app = app.lock().await;
        assert_eq!(app.texts().get(1), Some("text"));
        assert_eq!(app.texts().get(3), Some("text"));
        assert_eq!(app.current_page(), 3);
        let status = app.ocr_status();
        assert_eq!(status.batch, BatchState::Complete);
        assert_eq!(status.progress, 100);
        assert_eq!(status.batch_completed, 3);
    }

    #[tokio::test]
    async fn test_failed_page_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("text"));
        converter
            .failing_pages
            .lock()
            .insert("page-2.png".to_string());
        let app = shared_app(4);

        let summary = run_full_document(app.clone(), orchestrator(converter.clone(), dir.path()))
            .await
            .unwrap();

        assert_eq!(summary.failed, vec![2]);
        assert_eq!(converter.uploads.lock().len(), 3);

        let app = app.lock().await;
        assert!(app.texts().get(2).unwrap().starts_with("OCR failed:"));
        assert_eq!(app.texts().get(3), Some("text"));
        assert_eq!(app.ocr_status().batch_failed, vec![2]);
        assert!(!app.is_busy());
    }

    #[tokio::test]
    async fn test_batch_clears_previous_text() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("fresh"));
        let app = shared_app(2);
        {
            let mut app = app.lock().await;
            app.show_page(1).unwrap();
            app.edit_text("stale edit").unwrap();
        }

        run_full_document(app.clone(), orchestrator(converter, dir.path()))
            .await
            .unwrap();

        let app = app.lock().await;
        assert_eq!(app.texts().get(1), Some("fresh"));
        assert_eq!(app.current_text(), "fresh");
    }

    #[tokio::test]
    async fn test_placeholder_only_document() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("text"));
        let app = shared_app(1);

        let summary = run_full_document(app.clone(), orchestrator(converter.clone(), dir.path()))
            .await
            .unwrap();

        assert_eq!(summary.pages, 0);
        assert!(converter.uploads.lock().is_empty());
        assert_eq!(app.lock().await.ocr_status().batch, BatchState::Complete);
    }

    #[tokio::test]
    async fn test_batch_requires_document() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Arc::new(FakeConverter::replying("text"));
        let app: SharedApp = Arc::new(tokio::sync::Mutex::new(App::new(Arc::new(
            AppConfig::default(),
        ))));

        let result = run_full_document(app.clone(), orchestrator(converter, dir.path())).await;
        assert!(result.is_err());
        assert!(!app.lock().await.is_busy());
    }
}
