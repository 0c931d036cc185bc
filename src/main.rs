//! PDF OCR Studio - Entry point
//!
//! MCP server for OCR of scanned PDFs with per-page text correction.

use pdf_ocr_studio::{run_server_with_config, AppConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_ocr_studio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        token_file = %config.token_file.display(),
        drive_api_base = %config.drive_api_base,
        "Starting PDF OCR Studio"
    );

    run_server_with_config(config).await
}
