//! Streamed Text Chat
//!
//! A thin client over an OpenAI-compatible chat completion endpoint that
//! yields the assistant's reply as a lazy stream of text fragments, plus the
//! `Conversation` that owns the message history and folds those fragments
//! into complete assistant messages.

use crate::persona;
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{fmt, pin::Pin};
use tracing::{debug, error};

/// Default model for text conversations.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Failures of a streamed chat turn.
///
/// A failure is terminal for the turn: fragments delivered before it are not
/// retracted.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Cannot send an empty message")]
    EmptyMessage,
    #[error("Chat completion request failed: {0}")]
    Request(String),
    #[error("Chat completion stream failed: {0}")]
    Stream(String),
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single role-tagged entry of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A lazy, finite, non-restartable stream of reply fragments.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, StreamError>> + Send>>;

/// A client able to stream a chat completion for a message history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Issues one streaming completion request for `history`.
    ///
    /// The returned stream ends when the reply is complete. A request that
    /// cannot be started fails here; a failure mid-stream is yielded as the
    /// stream's last item.
    async fn stream_reply(&self, history: &[ChatMessage]) -> Result<ChatStream, StreamError>;
}

/// An implementation of `ChatClient` for any OpenAI-compatible API.
pub struct OpenAIChatClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIChatClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the completion service.
    /// * `model` - Model identifier used for every request (e.g. "gpt-4o-mini").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn to_request_messages(
        history: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        history
            .iter()
            .map(|msg| -> Result<ChatCompletionRequestMessage, OpenAIError> {
                Ok(match msg.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(msg.content.clone())
                        .build()?
                        .into(),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(msg.content.clone())
                        .build()?
                        .into(),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(msg.content.clone())
                        .build()?
                        .into(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_reply(&self, history: &[ChatMessage]) -> Result<ChatStream, StreamError> {
        let messages = Self::to_request_messages(history)
            .map_err(|e| StreamError::Request(e.to_string()))?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(true)
            .build()
            .map_err(|e| StreamError::Request(e.to_string()))?;

        let stream = self.client.chat().create_stream(request).await.map_err(|e| {
            error!(error = %e, "Error calling chat completion API");
            StreamError::Request(e.to_string())
        })?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => response
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.clone())
                    .filter(|content| !content.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(StreamError::Stream(e.to_string()))),
            }
        })))
    }
}

/// The ordered message history of one text conversation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Starts a conversation from an arbitrary history.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Starts a conversation seeded with the therapist persona and its greeting.
    pub fn therapist() -> Self {
        Self::new(vec![
            ChatMessage::system(persona::CHAT_SYSTEM_PROMPT),
            ChatMessage::assistant(persona::CHAT_GREETING),
        ])
    }

    /// The full history, system prompt included.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The history as it should be shown to the user.
    pub fn visible_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// Sends one user turn and streams the assistant's reply.
    ///
    /// `on_partial` is invoked after every fragment with the reply accumulated
    /// so far. The complete reply is appended to the history only once the
    /// stream has ended, and is returned. On failure the user's message stays
    /// in the history and no assistant message is added.
    pub async fn submit<F>(
        &mut self,
        client: &dyn ChatClient,
        user_text: &str,
        mut on_partial: F,
    ) -> Result<String, StreamError>
    where
        F: FnMut(&str) + Send,
    {
        if user_text.trim().is_empty() {
            return Err(StreamError::EmptyMessage);
        }
        self.messages.push(ChatMessage::user(user_text));

        let mut stream = client.stream_reply(&self.messages).await?;
        let mut full_response = String::new();
        while let Some(fragment) = stream.next().await {
            full_response.push_str(&fragment?);
            on_partial(&full_response);
        }

        debug!(chars = full_response.len(), "Assistant reply complete");
        self.messages.push(ChatMessage::assistant(full_response.clone()));
        Ok(full_response)
    }
}
