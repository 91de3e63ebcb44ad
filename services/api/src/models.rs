//! API Models
//!
//! Request and response bodies of the HTTP endpoints, annotated for OpenAPI
//! generation with `utoipa`.

use callbridge_core::registry::SessionSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// Client identity to embed in the token. Generated when omitted.
    pub identity: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct TokenResponse {
    pub token: String,
    #[schema(example = "user_1718000000000")]
    pub identity: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub active_sessions: usize,
}

/// A live relay session as exposed over HTTP.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct SessionSummary {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(example = "STREAMING")]
    pub state: String,
    pub stream_sid: Option<String>,
    pub call_sid: Option<String>,
    pub conversation_id: Option<String>,
    pub frames_to_ai: u64,
    pub frames_to_telephony: u64,
    pub created_at: DateTime<Utc>,
}

impl From<SessionSnapshot> for SessionSummary {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id,
            state: snapshot.state.to_string(),
            stream_sid: snapshot.stream_sid,
            call_sid: snapshot.call_sid,
            conversation_id: snapshot.conversation_id,
            frames_to_ai: snapshot.frames_to_ai,
            frames_to_telephony: snapshot.frames_to_telephony,
            created_at: snapshot.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}
