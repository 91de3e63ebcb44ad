use crate::Side;
use uuid::Uuid;

/// Failures of the pure protocol translation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("stream sid is not known yet")]
    MissingStreamSid,
}

/// Failures reported by a `RelaySocket`.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("{0} socket is not open")]
    NotOpen(Side),
    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a session with id {0} is already registered")]
    DuplicateSession(Uuid),
}
