//! Credential providers for the remote conversion service
//!
//! The interactive consent flow that produces the first token is outside this
//! crate. What lives here is the part that runs on every request: read the
//! stored authorized-user token, refresh it when it is about to expire and
//! write the refreshed token back.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens with less remaining lifetime than this are refreshed
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Opaque bearer credential
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Capability to obtain a currently valid credential
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Result<Credential>;
}

/// Always hands out the same bearer token
pub struct StaticProvider {
    credential: Credential,
}

impl StaticProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Credential::new(token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn credential(&self) -> Result<Credential> {
        Ok(self.credential.clone())
    }
}

/// Authorized-user token file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    scopes: Option<Vec<String>>,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        match self.expiry {
            Some(expiry) if expiry - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) > now => {
                Some(token)
            }
            _ => None,
        }
    }
}

/// OAuth client secret file, "installed" or "web" application section
#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Reads `token.json`, refreshing and rewriting it when expired
pub struct TokenFileProvider {
    token_file: PathBuf,
    client_secret_file: PathBuf,
    http: reqwest::Client,
    // Serializes refreshes so two callers never race on the token file
    lock: Mutex<()>,
}

impl TokenFileProvider {
    pub fn new(
        token_file: impl Into<PathBuf>,
        client_secret_file: impl Into<PathBuf>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            token_file: token_file.into(),
            client_secret_file: client_secret_file.into(),
            http,
            lock: Mutex::new(()),
        }
    }

    async fn read_token(&self) -> Result<StoredToken> {
        let raw = match tokio::fs::read(&self.token_file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Credential {
                    reason: format!(
                        "no authorized token at {}; complete the authorization flow first",
                        self.token_file.display()
                    ),
                });
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| Error::Credential {
            reason: format!("unreadable token file: {}", e),
        })
    }

    async fn read_client_secret(path: &Path) -> Result<ClientSecret> {
        let raw = tokio::fs::read(path).await.map_err(|e| Error::Credential {
            reason: format!("cannot read client secret {}: {}", path.display(), e),
        })?;
        let file: ClientSecretFile =
            serde_json::from_slice(&raw).map_err(|e| Error::Credential {
                reason: format!("unreadable client secret: {}", e),
            })?;
        file.installed.or(file.web).ok_or_else(|| Error::Credential {
            reason: "client secret has no installed or web section".to_string(),
        })
    }

    async fn refresh(&self, mut stored: StoredToken) -> Result<StoredToken> {
        let refresh_token = stored.refresh_token.clone().ok_or_else(|| Error::Credential {
            reason: "token expired and no refresh token is stored".to_string(),
        })?;

        let (client_id, client_secret, secret_token_uri) =
            match (stored.client_id.clone(), stored.client_secret.clone()) {
                (Some(id), Some(secret)) => (id, secret, None),
                _ => {
                    let secret = Self::read_client_secret(&self.client_secret_file).await?;
                    (secret.client_id, secret.client_secret, secret.token_uri)
                }
            };
        let token_uri = stored
            .token_uri
            .clone()
            .or(secret_token_uri)
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        tracing::info!("refreshing access token");

        let response = self
            .http
            .post(&token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Credential {
                reason: format!("token refresh failed with status: {}", response.status()),
            });
        }

        let body = response.bytes().await?;
        let refreshed: RefreshResponse =
            serde_json::from_slice(&body).map_err(|e| Error::Credential {
                reason: format!("unexpected token response: {}", e),
            })?;

        stored.token = Some(refreshed.access_token);
        stored.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        if refreshed.refresh_token.is_some() {
            stored.refresh_token = refreshed.refresh_token;
        }
        stored.client_id = Some(client_id);
        stored.client_secret = Some(client_secret);
        stored.token_uri = Some(token_uri);

        tokio::fs::write(&self.token_file, serde_json::to_vec_pretty(&stored)?).await?;
        Ok(stored)
    }
}

#[async_trait]
impl CredentialProvider for TokenFileProvider {
    async fn credential(&self) -> Result<Credential> {
        let _guard = self.lock.lock().await;

        let stored = self.read_token().await?;
        if let Some(token) = stored.valid_token(Utc::now()) {
            return Ok(Credential::new(token));
        }

        let refreshed = self.refresh(stored).await?;
        refreshed
            .token
            .map(Credential::new)
            .ok_or_else(|| Error::Credential {
                reason: "refresh returned no access token".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_at(expiry: Option<DateTime<Utc>>) -> StoredToken {
        StoredToken {
            token: Some("ya29.token".to_string()),
            refresh_token: None,
            token_uri: None,
            client_id: None,
            client_secret: None,
            scopes: None,
            expiry,
        }
    }

    #[test]
    fn test_valid_token_respects_margin() {
        let now = Utc::now();
        assert!(token_at(Some(now + ChronoDuration::hours(1)))
            .valid_token(now)
            .is_some());
        assert!(token_at(Some(now + ChronoDuration::seconds(30)))
            .valid_token(now)
            .is_none());
        assert!(token_at(None).valid_token(now).is_none());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("secret-token");
        assert_eq!(format!("{:?}", cred), "Credential(<redacted>)");
        assert_eq!(cred.bearer(), "secret-token");
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticProvider::new("abc");
        assert_eq!(provider.credential().await.unwrap().bearer(), "abc");
    }

    #[tokio::test]
    async fn test_missing_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = TokenFileProvider::new(
            dir.path().join("token.json"),
            dir.path().join("client_secret.json"),
            reqwest::Client::new(),
        );
        assert!(matches!(
            provider.credential().await,
            Err(Error::Credential { .. })
        ));
    }

    #[tokio::test]
    async fn test_unexpired_token_is_returned_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        let expiry = (Utc::now() + ChronoDuration::hours(1)).to_rfc3339();
        std::fs::write(
            &token_path,
            format!(
                r#"{{"token": "ya29.live", "refresh_token": "1//r", "expiry": "{}"}}"#,
                expiry
            ),
        )
        .unwrap();

        let provider = TokenFileProvider::new(
            &token_path,
            dir.path().join("client_secret.json"),
            reqwest::Client::new(),
        );
        assert_eq!(provider.credential().await.unwrap().bearer(), "ya29.live");
    }

    #[tokio::test]
    async fn test_unreadable_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(&token_path, "not json").unwrap();

        let provider = TokenFileProvider::new(
            &token_path,
            dir.path().join("client_secret.json"),
            reqwest::Client::new(),
        );
        let err = provider.credential().await.unwrap_err();
        assert!(err.to_string().contains("unreadable token file"));
    }

    #[tokio::test]
    async fn test_expired_token_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        std::fs::write(
            &token_path,
            r#"{"token": "ya29.old", "expiry": "2000-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let provider = TokenFileProvider::new(
            &token_path,
            dir.path().join("client_secret.json"),
            reqwest::Client::new(),
        );
        let err = provider.credential().await.unwrap_err();
        assert!(err.to_string().contains("no refresh token"));
    }

    #[tokio::test]
    async fn test_client_secret_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "id", "client_secret": "s", "token_uri": "https://example.test/token"}}"#,
        )
        .unwrap();
        let secret = TokenFileProvider::read_client_secret(&path).await.unwrap();
        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.token_uri.as_deref(), Some("https://example.test/token"));

        std::fs::write(&path, r#"{"other": {}}"#).unwrap();
        assert!(TokenFileProvider::read_client_secret(&path).await.is_err());
    }
}
