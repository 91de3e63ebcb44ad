//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application: the
//! token and call-routing endpoints, session inspection, and the media-stream
//! socket upgrade. Requests for any other upgrade path fall through to 404.

use crate::{
    handlers::{self, MEDIA_STREAM_PATH},
    models::{ErrorResponse, HealthResponse, SessionSummary, TokenResponse},
    state::AppState,
    ws::media_stream_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::issue_token,
        handlers::twiml,
        handlers::health,
        handlers::list_sessions,
        handlers::get_session,
    ),
    components(
        schemas(TokenResponse, HealthResponse, SessionSummary, ErrorResponse)
    ),
    tags(
        (name = "Callbridge API", description = "Telephony to conversational-AI audio relay")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/token", get(handlers::issue_token))
        .route("/twiml", get(handlers::twiml).post(handlers::twiml))
        .route("/health", get(handlers::health))
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/{id}", get(handlers::get_session))
        .route(MEDIA_STREAM_PATH, get(media_stream_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_documents_both_twiml_methods() {
        let doc = ApiDoc::openapi();
        let twiml = doc.paths.paths.get("/twiml").unwrap();
        assert!(twiml.get.is_some());
        assert!(twiml.post.is_some());
    }
}
