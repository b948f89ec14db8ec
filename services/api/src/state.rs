//! Shared Application State

use crate::config::Config;
use std::sync::Arc;
use therapist_core::chat::ChatClient;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat_client: Arc<dyn ChatClient>,
    /// Used to reach the upstream realtime sessions endpoint.
    pub http: reqwest::Client,
}
