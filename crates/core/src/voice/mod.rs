//! Realtime Voice Sessions
//!
//! This module owns everything needed to run one realtime voice session:
//!
//! - `controller`: the lifecycle state machine and its resource teardown.
//! - `credential`: ephemeral credentials and the token endpoint client.
//! - `signaling`: the offer/answer exchange with the remote service.
//! - `events`: JSON messages carried on the event channel.
//! - `platform`: traits for the microphone, peer connection and playback.

pub mod controller;
pub mod credential;
pub mod events;
pub mod platform;
pub mod signaling;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{TranscriptCallback, VoicePlatform, VoiceSessionController, VoiceState};

use crate::persona;
use events::Modality;
use platform::{MediaError, TransportError};

/// Label of the event channel negotiated alongside the audio track.
pub const EVENT_CHANNEL_LABEL: &str = "oai-events";

/// Per-controller settings.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub channel_label: String,
    pub instructions: String,
    pub modalities: Vec<Modality>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            channel_label: EVENT_CHANNEL_LABEL.to_string(),
            instructions: persona::VOICE_INSTRUCTIONS.to_string(),
            modalities: vec![Modality::Text, Modality::Audio],
        }
    }
}

/// Errors surfaced by the voice session controller.
///
/// Every variant returned from `start` is raised only after the session's
/// resources have been released.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("Failed to get session token: {0}")]
    Credential(#[from] credential::CredentialError),
    #[error("Microphone access failed: {0}")]
    MediaAccess(#[from] MediaError),
    #[error("Failed to connect to the realtime service: {0}")]
    Negotiation(String),
    #[error("Not connected. Try reconnecting.")]
    NotConnected,
    #[error("Malformed realtime event: {0}")]
    MalformedEvent(String),
    #[error("Error starting conversation: {0}")]
    ChannelSend(TransportError),
    #[error("Session was stopped before it finished connecting")]
    Cancelled,
    #[error("Session ended by the remote side while connecting: {0}")]
    SessionEnded(String),
}

impl From<signaling::NegotiationError> for VoiceError {
    fn from(err: signaling::NegotiationError) -> Self {
        VoiceError::Negotiation(err.to_string())
    }
}

impl From<TransportError> for VoiceError {
    fn from(err: TransportError) -> Self {
        VoiceError::Negotiation(err.to_string())
    }
}
