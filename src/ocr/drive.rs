//! Remote image-to-text conversion through the Google Drive v3 API
//!
//! An image uploaded with the Google Docs MIME type is OCR'd by Drive; its
//! plain-text export is the recognized text.

use crate::error::{Error, Result};
use crate::ocr::credentials::Credential;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;

/// MIME type that asks Drive to convert the upload into a Google Docs document
pub const CONVERT_TO_MIME: &str = "application/vnd.google-apps.document";

/// Export format requested for the converted document
pub const EXPORT_MIME: &str = "text/plain";

/// Handle to a file created on the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
}

/// Upload / export / delete capability of a remote conversion service
#[async_trait]
pub trait RemoteConverter: Send + Sync {
    /// Upload a PNG image, requesting conversion to a text-bearing document
    async fn upload(&self, credential: &Credential, name: &str, png: Vec<u8>)
        -> Result<RemoteFile>;

    /// Download the converted document as plain text bytes
    async fn export_text(&self, credential: &Credential, file: &RemoteFile) -> Result<Vec<u8>>;

    /// Delete the remote file
    async fn delete(&self, credential: &Credential, file: &RemoteFile) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Drive v3 REST client
pub struct DriveConverter {
    http: reqwest::Client,
    api_base: String,
}

impl DriveConverter {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the HTTP client shared by the converter and the token refresher
    pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::HttpRequest)
    }

    fn upload_url(&self) -> Result<url::Url> {
        let mut url = self.endpoint("upload/drive/v3/files")?;
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", "id");
        Ok(url)
    }

    fn file_url(&self, file: &RemoteFile) -> Result<url::Url> {
        self.endpoint(&format!("drive/v3/files/{}", file.id))
    }

    fn endpoint(&self, path: &str) -> Result<url::Url> {
        url::Url::parse(&format!("{}/{}", self.api_base, path)).map_err(|e| {
            Error::RemoteService {
                reason: format!("Invalid URL: {}", e),
            }
        })
    }
}

/// Assemble a `multipart/related` body: JSON metadata part, then the media part
fn multipart_related(boundary: &str, metadata: &serde_json::Value, png: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(png.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(png);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

async fn ensure_success(response: reqwest::Response, step: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(step, %status, body = %body, "remote call rejected");
    Err(Error::RemoteService {
        reason: format!("{} returned {}", step, status),
    })
}

#[async_trait]
impl RemoteConverter for DriveConverter {
    async fn upload(
        &self,
        credential: &Credential,
        name: &str,
        png: Vec<u8>,
    ) -> Result<RemoteFile> {
        let boundary = format!("ocr-{}", uuid::Uuid::new_v4().simple());
        let metadata = serde_json::json!({ "name": name, "mimeType": CONVERT_TO_MIME });
        let body = multipart_related(&boundary, &metadata, &png);

        let response = self
            .http
            .post(self.upload_url()?)
            .bearer_auth(credential.bearer())
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let response = ensure_success(response, "upload").await?;

        let bytes = response.bytes().await?;
        let created: CreatedFile =
            serde_json::from_slice(&bytes).map_err(|e| Error::RemoteService {
                reason: format!("unexpected upload response: {}", e),
            })?;

        tracing::debug!(file_id = %created.id, "image uploaded");
        Ok(RemoteFile { id: created.id })
    }

    async fn export_text(&self, credential: &Credential, file: &RemoteFile) -> Result<Vec<u8>> {
        let mut url = self.file_url(file)?;
        url.path_segments_mut()
            .map_err(|_| Error::RemoteService {
                reason: "Invalid export URL".to_string(),
            })?
            .push("export");
        url.query_pairs_mut().append_pair("mimeType", EXPORT_MIME);

        let response = self
            .http
            .get(url)
            .bearer_auth(credential.bearer())
            .send()
            .await?;
        let response = ensure_success(response, "export").await?;

        // Pull the export chunk by chunk until the stream ends
        let mut data = Vec::new();
        let mut stream = response.bytes_stream();
        let mut chunks = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::HttpRequest)?;
            data.extend_from_slice(&chunk);
            chunks += 1;
        }

        tracing::debug!(file_id = %file.id, chunks, bytes = data.len(), "export downloaded");
        Ok(data)
    }

    async fn delete(&self, credential: &Credential, file: &RemoteFile) -> Result<()> {
        let response = self
            .http
            .delete(self.file_url(file)?)
            .bearer_auth(credential.bearer())
            .send()
            .await?;
        ensure_success(response, "delete").await?;

        tracing::debug!(file_id = %file.id, "remote file deleted");
        Ok(())
    }
}
