//! Opens the AI-provider side of a bridged call.

pub mod elevenlabs;

use super::socket::ChannelSocket;
use async_trait::async_trait;
use futures_util::Stream;
use std::{pin::Pin, time::Duration};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};

/// Inbound half of the AI-provider socket.
pub type AiStream = Pin<Box<dyn Stream<Item = Result<WsMessage, WsError>> + Send>>;

/// An open AI-provider connection, split into its two halves.
pub struct AiConnection {
    pub socket: ChannelSocket,
    pub inbound: AiStream,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("signed URL request failed: {0}")]
    SignedUrl(#[from] reqwest::Error),
    #[error("signed URL request returned status {0}")]
    SignedUrlStatus(u16),
    #[error("signed URL response did not contain a URL")]
    MissingSignedUrl,
    #[error("AI socket handshake failed: {0}")]
    Handshake(#[from] WsError),
    #[error("AI socket did not open within {0:?}")]
    Timeout(Duration),
}

/// Establishes AI-provider connections. One call per relay session; never retried.
#[async_trait]
pub trait AiConnector: Send + Sync {
    async fn connect(&self) -> Result<AiConnection, ConnectError>;
}
