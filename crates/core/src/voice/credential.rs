//! Ephemeral session credentials.
//!
//! A credential is minted by the server-side proxy, fetched once per voice
//! session, and only ever used to authenticate the offer/answer exchange.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Token endpoint returned status {0}")]
    Status(u16),
    #[error("Token request failed: {0}")]
    Transport(String),
    #[error("Malformed token response: {0}")]
    Malformed(String),
}

/// A short-lived bearer token for one realtime session.
pub struct SessionCredential {
    token: SecretString,
    expires_at: Option<i64>,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at: None,
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Expiry as Unix seconds, when the minting service reported one.
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// Parses the proxy's response body: `{"client_secret": {"value": ...}}`.
    pub fn from_json(body: &str) -> Result<Self, CredentialError> {
        let envelope: Envelope =
            serde_json::from_str(body).map_err(|e| CredentialError::Malformed(e.to_string()))?;
        Ok(Self {
            token: SecretString::from(envelope.client_secret.value),
            expires_at: envelope.client_secret.expires_at,
        })
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct Envelope {
    client_secret: ClientSecret,
}

#[derive(Deserialize)]
struct ClientSecret {
    value: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Anything able to hand out a fresh session credential.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self) -> Result<SessionCredential, CredentialError>;
}

/// Fetches credentials from the token endpoint with a plain `GET`.
pub struct HttpCredentialSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch(&self) -> Result<SessionCredential, CredentialError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            error!(%status, url = %self.url, "Failed to get session token");
            return Err(CredentialError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;
        let credential = SessionCredential::from_json(&body)?;
        debug!(expires_at = ?credential.expires_at(), "Obtained session credential");
        Ok(credential)
    }
}
