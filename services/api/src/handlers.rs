//! Axum Handlers for the REST API
//!
//! The realtime credential proxy, the streamed chat relay and a health probe.
//! Handlers carry `utoipa` doc comments for the OpenAPI document.

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{Stream, StreamExt};
use secrecy::ExposeSecret;
use serde_json::json;
use std::{convert::Infallible, sync::Arc};
use therapist_core::chat::ChatMessage;
use tracing::{debug, error, info, warn};

use crate::{
    models::{ChatRequest, ErrorResponse, HealthResponse},
    state::AppState,
};

/// Payload of the final `done` event. SSE clients drop events without data.
const DONE_MARKER: &str = "[DONE]";

pub enum ApiError {
    BadRequest(String),
    Upstream { status: StatusCode, message: String },
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Upstream { status, message } => {
                (status, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Mint an ephemeral realtime session credential.
///
/// The server-held API key never leaves this process; the browser only ever
/// sees the short-lived `client_secret` in the relayed session object.
#[utoipa::path(
    get,
    path = "/api/realtime-session",
    responses(
        (status = 200, description = "Upstream session object, including client_secret.value", body = Object),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn realtime_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = &state.config;
    let response = state
        .http
        .post(config.realtime_sessions_url())
        .bearer_auth(config.openai_api_key.expose_secret())
        .json(&json!({
            "model": config.realtime_model,
            "voice": config.realtime_voice,
        }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        error!(%status, %detail, "Upstream rejected realtime session request");
        return Err(ApiError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: "Failed to create session".to_string(),
        });
    }

    let session = response.json::<serde_json::Value>().await?;
    info!(model = %config.realtime_model, "Realtime session created");
    Ok(Json(session))
}

/// Stream a therapist reply as Server-Sent Events.
///
/// Emits one `delta` event per text fragment followed by `done` (data
/// `[DONE]`). A failure mid-stream emits a single `error` event and ends the
/// stream.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Event stream of reply fragments", content_type = "text/event-stream", body = String),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 502, description = "Chat model unreachable", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_string()));
    }

    let history: Vec<ChatMessage> = request.messages.into_iter().map(Into::into).collect();
    debug!(messages = history.len(), "Relaying chat request");

    let mut fragments = state
        .chat_client
        .stream_reply(&history)
        .await
        .map_err(|e| {
            error!(error = %e, "Chat request failed");
            ApiError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: "Failed to reach chat model".to_string(),
            }
        })?;

    let events = async_stream::stream! {
        let mut failed = false;
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(text) => yield Ok::<_, Infallible>(Event::default().event("delta").data(text)),
                Err(e) => {
                    warn!(error = %e, "Chat stream ended with an error");
                    yield Ok::<_, Infallible>(Event::default().event("error").data(e.to_string()));
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            yield Ok::<_, Infallible>(Event::default().event("done").data(DONE_MARKER));
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
