//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{ChatMessagePayload, ChatRequest, ErrorResponse, HealthResponse, MessageRole},
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::realtime_session,
        handlers::chat,
        handlers::health,
    ),
    components(
        schemas(ChatRequest, ChatMessagePayload, MessageRole, ErrorResponse, HealthResponse)
    ),
    tags(
        (name = "Therapist API", description = "Credential proxy and chat relay for the AI therapist")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/api/realtime-session", get(handlers::realtime_session))
        .route("/api/chat", post(handlers::chat))
        .route("/health", get(handlers::health))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
