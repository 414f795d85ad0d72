//! HTTP route handlers for the relay API.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::relay::{GenerateRequest, RelayError};

use super::state::AppState;

/// Create the API router with all routes.
///
/// CORS is applied here rather than in [`super::run_server_with_shutdown`] so that every
/// response carries `Access-Control-Allow-Origin: *`. The layer answers
/// `OPTIONS /generate` itself with an empty 200.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_check))
        .route("/generate", post(generate))
        .with_state(state)
        .layer(cors)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sark-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Relay a generation request and stream the provider's response back.
async fn generate(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, RelayError> {
    let request: GenerateRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!("Rejecting malformed generate body: {e}");
        RelayError::from(e)
    })?;

    let stream = state.relay.generate(&request).await.inspect_err(|e| {
        tracing::warn!(status = %e.status(), "Generation failed: {e}");
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"))
        .header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))
        .body(Body::from_stream(stream))
        .map_err(|e| RelayError::InternalFault(e.to_string()))
}
