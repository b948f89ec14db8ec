use secrecy::SecretString;
use std::net::SocketAddr;
use tracing::Level;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
const DEFAULT_REALTIME_VOICE: &str = "echo";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// The only secret the service holds; never sent to browsers.
    pub openai_api_key: SecretString,
    pub openai_api_base: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub chat_model: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let openai_api_base = std::env::var("OPENAI_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let realtime_model = std::env::var("REALTIME_MODEL")
            .unwrap_or_else(|_| DEFAULT_REALTIME_MODEL.to_string());
        let realtime_voice = std::env::var("REALTIME_VOICE")
            .unwrap_or_else(|_| DEFAULT_REALTIME_VOICE.to_string());
        let chat_model = std::env::var("CHAT_MODEL")
            .unwrap_or_else(|_| therapist_core::chat::DEFAULT_CHAT_MODEL.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            openai_api_base,
            realtime_model,
            realtime_voice,
            chat_model,
            log_level,
        })
    }

    /// Upstream endpoint that mints ephemeral realtime credentials.
    pub fn realtime_sessions_url(&self) -> String {
        format!("{}/realtime/sessions", self.openai_api_base)
    }
}
