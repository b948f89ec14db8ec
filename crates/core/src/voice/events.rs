//! JSON events exchanged over the realtime event channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound event type carrying a chunk of streamed text.
pub const TEXT_STREAM: &str = "text.stream";

/// Output modalities that can be requested for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseConfig {
    pub modalities: Vec<Modality>,
    pub instructions: String,
}

/// Events we send to the realtime service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Asks the service to start producing a response.
    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseConfig },
}

impl ClientEvent {
    pub fn response_create(modalities: Vec<Modality>, instructions: impl Into<String>) -> Self {
        ClientEvent::ResponseCreate {
            response: ResponseConfig {
                modalities,
                instructions: instructions.into(),
            },
        }
    }
}

/// Events received from the realtime service.
///
/// Only streamed text is interpreted; everything else is surfaced by its
/// `type` so it can be logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    TextStream { content: Option<String> },
    Other { kind: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<Value>,
}

impl ServerEvent {
    /// Parses one channel message. Anything that is not a JSON object with a
    /// string `type` is rejected.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(payload)?;
        if envelope.kind == TEXT_STREAM {
            let content = envelope
                .text
                .as_ref()
                .and_then(|text| text.get("content"))
                .and_then(Value::as_str)
                .map(str::to_string);
            Ok(ServerEvent::TextStream { content })
        } else {
            Ok(ServerEvent::Other {
                kind: envelope.kind,
            })
        }
    }

    /// The text this event contributes to the transcript, if any.
    pub fn text_chunk(&self) -> Option<&str> {
        match self {
            ServerEvent::TextStream {
                content: Some(content),
            } if !content.is_empty() => Some(content.as_str()),
            _ => None,
        }
    }
}
