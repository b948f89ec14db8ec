//! API Models
//!
//! Request and response bodies, annotated with `utoipa` for the OpenAPI document.

use serde::{Deserialize, Serialize};
use therapist_core::chat::{ChatMessage, Role};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::System => Role::System,
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct ChatMessagePayload {
    #[schema(example = "user")]
    pub role: MessageRole,
    #[schema(example = "I've been feeling anxious about work lately.")]
    pub content: String,
}

impl From<ChatMessagePayload> for ChatMessage {
    fn from(payload: ChatMessagePayload) -> Self {
        ChatMessage::new(payload.role.into(), payload.content)
    }
}

/// The full conversation so far, oldest first.
#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessagePayload>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct ErrorResponse {
    #[schema(example = "Failed to create session")]
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, PartialEq)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}
