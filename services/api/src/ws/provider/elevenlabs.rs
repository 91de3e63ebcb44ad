//! Handles the WebSocket connection to the ElevenLabs conversational-AI API.

use super::{AiConnection, AiConnector, ConnectError};
use crate::{
    config::Config,
    ws::socket::{ChannelSocket, tungstenite_message},
};
use async_trait::async_trait;
use callbridge_core::Side;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tracing::{debug, info};

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize, Debug)]
struct SignedUrlResponse {
    signed_url: Option<String>,
}

pub struct ElevenLabsConnector {
    http: reqwest::Client,
    api_key: String,
    agent_id: String,
    api_base: String,
    fixed_url: Option<String>,
}

impl ElevenLabsConnector {
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: http_client()?,
            api_key: config.elevenlabs_api_key.clone(),
            agent_id: config.elevenlabs_agent_id.clone(),
            api_base: config.elevenlabs_api_base.clone(),
            fixed_url: config.elevenlabs_ws_url.clone(),
        })
    }

    /// Asks the provider for a short-lived, pre-authorized socket URL.
    pub async fn signed_url(&self) -> Result<String, ConnectError> {
        let url = format!("{}/v1/convai/conversation/get_signed_url", self.api_base);
        let response = self
            .http
            .get(url)
            .query(&[("agent_id", self.agent_id.as_str())])
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectError::SignedUrlStatus(status.as_u16()));
        }

        let body: SignedUrlResponse = response.json().await?;
        body.signed_url
            .filter(|url| !url.is_empty())
            .ok_or(ConnectError::MissingSignedUrl)
    }
}

fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_REQUEST_TIMEOUT)
        .build()
}

#[async_trait]
impl AiConnector for ElevenLabsConnector {
    async fn connect(&self) -> Result<AiConnection, ConnectError> {
        let url = match &self.fixed_url {
            Some(url) => url.clone(),
            None => self.signed_url().await?,
        };
        debug!("Opening AI provider socket");

        let (ws_stream, _) = tokio::time::timeout(SOCKET_OPEN_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| ConnectError::Timeout(SOCKET_OPEN_TIMEOUT))??;
        info!("Connected to ElevenLabs conversational AI.");

        let (sink, stream) = ws_stream.split();
        // The writer task ends on its own once a close frame is written or the
        // connection drops.
        let (socket, _writer) = ChannelSocket::spawn(Side::Ai, sink, tungstenite_message);

        Ok(AiConnection {
            socket,
            inbound: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    fn connector(api_base: String) -> ElevenLabsConnector {
        ElevenLabsConnector {
            http: http_client().unwrap(),
            api_key: "test-xi-key".to_string(),
            agent_id: "agent_123".to_string(),
            api_base,
            fixed_url: None,
        }
    }

    #[tokio::test]
    async fn test_signed_url_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/convai/conversation/get_signed_url"))
            .and(query_param("agent_id", "agent_123"))
            .and(header("xi-api-key", "test-xi-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "signed_url": "wss://example.test/convai?token=abc" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = connector(server.uri()).signed_url().await.unwrap();
        assert_eq!(url, "wss://example.test/convai?token=abc");
    }

    #[tokio::test]
    async fn test_signed_url_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = connector(server.uri()).signed_url().await.unwrap_err();
        assert!(matches!(err, ConnectError::SignedUrlStatus(401)));
    }

    #[tokio::test]
    async fn test_signed_url_missing_from_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = connector(server.uri()).signed_url().await.unwrap_err();
        assert!(matches!(err, ConnectError::MissingSignedUrl));
    }

    #[tokio::test]
    async fn test_connect_fails_when_nothing_listens() {
        let mut connector = connector("http://127.0.0.1:9".to_string());
        connector.fixed_url = Some("ws://127.0.0.1:9/convai".to_string());

        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, ConnectError::Handshake(_)));
    }
}
