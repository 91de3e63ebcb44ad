//! Mock conversational-AI provider socket.
//!
//! Accepts a single connection, reports every frame it receives, and sends
//! whatever the test tells it to.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Text(String),
    Closed,
}

enum Command {
    Send(String),
    Close,
}

pub struct MockConvai {
    pub addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Received>,
    commands: mpsc::UnboundedSender<Command>,
}

impl MockConvai {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (commands, mut command_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let _ = received_tx.send(Received::Text(text.as_str().to_string()));
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                            let _ = received_tx.send(Received::Closed);
                            break;
                        }
                        Some(Ok(_)) => {}
                    },
                    cmd = command_rx.recv() => match cmd {
                        Some(Command::Send(text)) => {
                            if write.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Command::Close) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                }
            }
        });

        Self {
            addr,
            received,
            commands,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/convai", self.addr)
    }

    pub async fn next(&mut self) -> Received {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.received.recv())
            .await
            .expect("timed out waiting for the relay")
            .unwrap_or(Received::Closed)
    }

    pub async fn next_json(&mut self) -> serde_json::Value {
        match self.next().await {
            Received::Text(text) => serde_json::from_str(&text).unwrap(),
            Received::Closed => panic!("mock provider connection closed"),
        }
    }

    pub fn send(&self, message: serde_json::Value) {
        let _ = self.commands.send(Command::Send(message.to_string()));
    }

    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}
