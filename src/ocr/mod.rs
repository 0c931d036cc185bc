//! Page OCR through a remote document converter
//!
//! - [`orchestrator`]: render, upload, export, delete and clean one page
//! - [`worker`]: run a page job in the background and hand back its result
//! - [`batch`]: recognize every page of the document in order

pub mod batch;
mod cleanup;
pub mod credentials;
pub mod drive;
pub mod orchestrator;
pub mod retry;
pub mod worker;

pub use batch::{
    begin_full_document, continue_full_document, overall_progress, run_full_document,
    BatchSummary,
};
pub use cleanup::clean_text;
pub use credentials::{Credential, CredentialProvider, StaticProvider, TokenFileProvider};
pub use drive::{DriveConverter, RemoteConverter, RemoteFile};
pub use orchestrator::{OcrOutcome, Orchestrator};
pub use retry::RetryPolicy;
pub use worker::{run_single_page, BatchState, OcrMonitor, OcrStatus, PageResult};
