//! Axum Handlers for the HTTP API
//!
//! Access-token minting, call-routing markup, health, and read-only
//! inspection of the live relay sessions. `utoipa` doc comments feed the
//! OpenAPI document.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::{ErrorResponse, HealthResponse, SessionSummary, TokenQuery, TokenResponse},
    state::AppState,
    token::mint_access_token,
};

/// Path the telephony provider is told to stream call audio to.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    ServiceUnavailable(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::ServiceUnavailable(message) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse { message }),
            )
                .into_response(),
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
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

/// Mint a telephony access token for a voice client.
#[utoipa::path(
    get,
    path = "/token",
    params(TokenQuery),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 503, description = "Token credentials are not configured", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = state.config.twilio.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Telephony token credentials are not configured".to_string())
    })?;

    let now = chrono::Utc::now();
    let identity = query
        .identity
        .filter(|identity| !identity.trim().is_empty())
        .unwrap_or_else(|| format!("user_{}", now.timestamp_millis()));
    info!(%identity, "Generating access token");

    let token = mint_access_token(
        credentials,
        &identity,
        state.config.token_ttl_secs,
        now.timestamp(),
    )?;
    Ok(Json(TokenResponse { token, identity }))
}

/// Call-routing markup that connects the call's audio to the relay socket.
#[utoipa::path(
    method(get, post),
    path = "/twiml",
    responses(
        (status = 200, description = "Call-routing markup", content_type = "text/xml", body = String),
        (status = 400, description = "Missing or malformed Host header", body = ErrorResponse)
    )
)]
pub async fn twiml(headers: HeaderMap) -> Result<Response, ApiError> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Host header is required".to_string()))?;
    if !is_plain_host(host) {
        return Err(ApiError::BadRequest("Host header is malformed".to_string()));
    }

    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <Stream url="wss://{host}{MEDIA_STREAM_PATH}" />
  </Connect>
</Response>"#
    );
    Ok(([(header::CONTENT_TYPE, "text/xml")], body).into_response())
}

/// A host name or address with an optional port, safe to place in markup.
fn is_plain_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']'))
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_sessions: state.registry.len(),
    })
}

/// List the live relay sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    responses((status = 200, description = "Live sessions", body = [SessionSummary]))
)]
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    Json(
        state
            .registry
            .list()
            .into_iter()
            .map(SessionSummary::from)
            .collect(),
    )
}

/// Get one live relay session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionSummary),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSummary>, ApiError> {
    let snapshot = state
        .registry
        .find(id)
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))?;
    Ok(Json(snapshot.into()))
}
