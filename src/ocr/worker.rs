//! Background page job and shared OCR status
//!
//! A page job runs on its own tokio task. Its only output is one
//! [`PageResult`] sent over a oneshot channel; the caller applies it to the
//! application state.

use crate::app::SharedApp;
use crate::error::Result;
use crate::ocr::orchestrator::{OcrOutcome, Orchestrator};
use crate::pdf::PageSource;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Completion handoff of one page job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    pub page: u32,
    pub outcome: OcrOutcome,
}

/// Full-document run state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Complete,
}

/// Snapshot of OCR activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OcrStatus {
    /// Page currently being recognized
    pub running_page: Option<u32>,
    /// Progress in percent (overall progress while a batch runs)
    pub progress: u8,
    pub batch: BatchState,
    pub batch_completed: u32,
    pub batch_total: u32,
    /// Pages whose recognition failed in the current or last batch
    pub batch_failed: Vec<u32>,
}

/// OCR status shared between the foreground state and running jobs
#[derive(Debug, Clone, Default)]
pub struct OcrMonitor(Arc<Mutex<OcrStatus>>);

impl OcrMonitor {
    pub fn snapshot(&self) -> OcrStatus {
        self.0.lock().clone()
    }

    pub fn set_progress(&self, progress: u8) {
        self.0.lock().progress = progress.min(100);
    }

    pub(crate) fn page_started(&self, page: u32) {
        let mut status = self.0.lock();
        status.running_page = Some(page);
        if status.batch != BatchState::Running {
            status.progress = 0;
        }
    }

    pub(crate) fn page_finished(&self, result: &PageResult) {
        let mut status = self.0.lock();
        status.running_page = None;
        if status.batch == BatchState::Running {
            status.batch_completed += 1;
            if !result.outcome.is_success() {
                status.batch_failed.push(result.page);
            }
        } else {
            status.progress = 100;
        }
    }

    pub(crate) fn batch_started(&self, total: u32) {
        let mut status = self.0.lock();
        *status = OcrStatus {
            batch: BatchState::Running,
            batch_total: total,
            ..OcrStatus::default()
        };
    }

    pub(crate) fn batch_finished(&self) {
        let mut status = self.0.lock();
        status.batch = BatchState::Complete;
        status.running_page = None;
        status.progress = 100;
    }
}

/// Start recognizing `page` on a background task
pub fn spawn_page_job(
    orchestrator: Arc<Orchestrator>,
    pages: Arc<dyn PageSource>,
    page: u32,
    progress: Arc<dyn Fn(u8) + Send + Sync>,
) -> oneshot::Receiver<PageResult> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let outcome = orchestrator.run_page(pages, page, &*progress).await;
        if tx.send(PageResult { page, outcome }).is_err() {
            tracing::debug!(page, "page result dropped, nobody waiting");
        }
    });

    rx
}

/// Wait for a page job; a job that died without reporting counts as failed
pub async fn await_completion(page: u32, rx: oneshot::Receiver<PageResult>) -> PageResult {
    rx.await.unwrap_or_else(|_| {
        tracing::warn!(page, "OCR worker stopped without a result");
        PageResult {
            page,
            outcome: OcrOutcome::Failed("OCR worker stopped unexpectedly".to_string()),
        }
    })
}

/// Recognize one page (the current page when `page` is `None`) and apply the
/// result to the application state
pub async fn run_single_page(
    app: &SharedApp,
    orchestrator: Arc<Orchestrator>,
    page: Option<u32>,
) -> Result<PageResult> {
    let (pages, page, monitor) = {
        let mut app = app.lock().await;
        let page = page.unwrap_or_else(|| app.current_page());
        let pages = app.start_page_ocr(page)?;
        (pages, page, app.monitor())
    };

    let progress = Arc::new(move |p: u8| monitor.set_progress(p));
    let rx = spawn_page_job(orchestrator, pages, page, progress);
    let result = await_completion(page, rx).await;

    app.lock().await.finish_ocr(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_sender_counts_as_failure() {
        let (tx, rx) = oneshot::channel::<PageResult>();
        drop(tx);

        let result = await_completion(4, rx).await;
        assert_eq!(result.page, 4);
        assert!(!result.outcome.is_success());
    }

    #[test]
    fn test_monitor_single_page_lifecycle() {
        let monitor = OcrMonitor::default();
        monitor.page_started(2);
        monitor.set_progress(40);
        assert_eq!(monitor.snapshot().running_page, Some(2));
        assert_eq!(monitor.snapshot().progress, 40);

        monitor.page_finished(&PageResult {
            page: 2,
            outcome: OcrOutcome::Text("x".to_string()),
        });
        let status = monitor.snapshot();
        assert_eq!(status.running_page, None);
        assert_eq!(status.progress, 100);
        assert_eq!(status.batch, BatchState::Idle);
    }

    #[test]
    fn test_monitor_batch_counts_failures() {
        let monitor = OcrMonitor::default();
        monitor.batch_started(2);
        monitor.page_started(1);
        monitor.page_finished(&PageResult {
            page: 1,
            outcome: OcrOutcome::Failed("boom".to_string()),
        });
        monitor.page_started(2);
        monitor.page_finished(&PageResult {
            page: 2,
            outcome: OcrOutcome::Text("ok".to_string()),
        });
        monitor.batch_finished();

        let status = monitor.snapshot();
        assert_eq!(status.batch, BatchState::Complete);
        assert_eq!(status.batch_completed, 2);
        assert_eq!(status.batch_failed, vec![1]);
        assert_eq!(status.progress, 100);
    }
}
