//! Application configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default project file extension
pub const PROJECT_EXTENSION: &str = "rexmi";

/// Runtime configuration for the OCR studio
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OAuth client secret file (installed-app format)
    pub client_secret_file: PathBuf,
    /// Authorized-user token file, refreshed in place
    pub token_file: PathBuf,
    /// Fixed bearer token; bypasses the token file when set
    pub access_token: Option<String>,
    /// Base URL of the Drive API (default: https://www.googleapis.com)
    pub drive_api_base: String,
    /// Attempts for the upload/export/delete sequence (default: 3)
    pub max_attempts: u32,
    /// Fixed delay between attempts (default: 2s)
    pub retry_delay: Duration,
    /// Scale used when rasterizing a page for OCR (default: 1.0)
    pub ocr_render_scale: f32,
    /// Scale used when rendering a page for display (default: 2.0)
    pub view_render_scale: f32,
    /// HTTP request timeout (default: 60s)
    pub http_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_secret_file: PathBuf::from("client_secret.json"),
            token_file: PathBuf::from("token.json"),
            access_token: None,
            drive_api_base: "https://www.googleapis.com".to_string(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            ocr_render_scale: 1.0,
            view_render_scale: 2.0,
            http_timeout: Duration::from_secs(60),
        }
    }
}

impl AppConfig {
    /// Build a configuration from defaults overridden by `OCR_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("OCR_CLIENT_SECRET_FILE") {
            config.client_secret_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("OCR_TOKEN_FILE") {
            config.token_file = PathBuf::from(v);
        }
        config.access_token = lookup("OCR_ACCESS_TOKEN").filter(|v| !v.trim().is_empty());
        if let Some(v) = lookup("OCR_DRIVE_API_BASE") {
            config.drive_api_base = v.trim_end_matches('/').to_string();
        }
        if let Some(n) = parse_var::<u32>(&lookup, "OCR_MAX_ATTEMPTS") {
            config.max_attempts = n.max(1);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "OCR_RETRY_DELAY_MS") {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(scale) = parse_var::<f32>(&lookup, "OCR_RENDER_SCALE") {
            if scale > 0.0 {
                config.ocr_render_scale = scale;
            }
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "OCR_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}
