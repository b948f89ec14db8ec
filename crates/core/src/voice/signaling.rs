//! Offer/answer exchange with the remote voice service.

use super::{credential::SessionCredential, platform::SessionDescription};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, error};

/// Realtime endpoint that accepts a local offer and answers with SDP.
pub const DEFAULT_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";
/// Realtime model requested during negotiation.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("Realtime service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Offer/answer exchange failed: {0}")]
    Transport(String),
}

/// Sends a local offer to the remote service and returns its answer.
#[async_trait]
pub trait Signaling: Send + Sync {
    async fn exchange(
        &self,
        credential: &SessionCredential,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, NegotiationError>;
}

/// `POST`s the raw offer SDP and treats the response body as the answer.
pub struct HttpSignaling {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl HttpSignaling {
    pub fn new(client: reqwest::Client, url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Signaling for HttpSignaling {
    async fn exchange(
        &self,
        credential: &SessionCredential,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("model", self.model.as_str())])
            .header(AUTHORIZATION, format!("Bearer {}", credential.token()))
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer.sdp.clone())
            .send()
            .await
            .map_err(|e| NegotiationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Failed to connect to the realtime service");
            return Err(NegotiationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let answer = response
            .text()
            .await
            .map_err(|e| NegotiationError::Transport(e.to_string()))?;
        debug!(bytes = answer.len(), "Received SDP answer");
        Ok(SessionDescription::answer(answer))
    }
}
