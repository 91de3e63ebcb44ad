//! Channel-backed socket handles.
//!
//! Each connection's write half is moved into its own writer task, fed by a
//! bounded channel. The relay session holds the sending end, so sends never
//! wait on the network and keep their order. A full queue or a stopped writer
//! makes every later send fail, which the session treats as the peer being
//! unavailable.

use callbridge_core::{Side, error::SocketError, socket::RelaySocket};
use futures_util::{Sink, SinkExt};
use std::fmt::Display;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

/// Frames a peer may fall behind by before it counts as unavailable.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// A frame queued for a writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// How a writer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterExit {
    /// The close frame was written.
    Closed,
    /// Every sender was dropped without asking for a close.
    Drained,
    /// The peer was already gone when the close frame was written.
    PeerGone,
    /// A data frame could not be written.
    Failed,
}

pub struct ChannelSocket {
    side: Side,
    tx: mpsc::Sender<OutboundFrame>,
    closed: bool,
}

impl ChannelSocket {
    pub fn new(side: Side, tx: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            side,
            tx,
            closed: false,
        }
    }

    /// Spawns a writer task over `sink`, converting queued frames with `to_message`.
    pub fn spawn<S, M>(
        side: Side,
        sink: S,
        to_message: fn(OutboundFrame) -> M,
    ) -> (Self, JoinHandle<WriterExit>)
    where
        S: Sink<M> + Unpin + Send + 'static,
        S::Error: Display,
        M: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let handle = tokio::spawn(write_frames(side, sink, rx, to_message));
        (Self::new(side, tx), handle)
    }
}

impl RelaySocket for ChannelSocket {
    fn is_open(&self) -> bool {
        !self.closed && !self.tx.is_closed()
    }

    fn send_text(&mut self, text: String) -> Result<(), SocketError> {
        if self.closed {
            return Err(SocketError::NotOpen(self.side));
        }
        self.tx
            .try_send(OutboundFrame::Text(text))
            .map_err(|e| {
                if let TrySendError::Full(_) = e {
                    warn!(side = %self.side, "Outbound queue is full; peer is not keeping up");
                }
                SocketError::NotOpen(self.side)
            })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Nothing to close if the writer is gone. If the queue is full the
        // writer stops once this handle is dropped.
        let _ = self.tx.try_send(OutboundFrame::Close);
    }
}

async fn write_frames<S, M>(
    side: Side,
    mut sink: S,
    mut rx: mpsc::Receiver<OutboundFrame>,
    to_message: fn(OutboundFrame) -> M,
) -> WriterExit
where
    S: Sink<M> + Unpin,
    S::Error: Display,
{
    let exit = loop {
        let Some(frame) = rx.recv().await else {
            break WriterExit::Drained;
        };
        let closing = frame == OutboundFrame::Close;
        if let Err(e) = sink.send(to_message(frame)).await {
            if closing {
                debug!(%side, error = %e, "Peer closed before the close frame was sent");
                break WriterExit::PeerGone;
            }
            warn!(%side, error = %e, "Failed to write to socket");
            break WriterExit::Failed;
        }
        if closing {
            let _ = sink.close().await;
            break WriterExit::Closed;
        }
    };
    debug!(%side, ?exit, "Socket writer finished");
    exit
}

pub fn axum_message(frame: OutboundFrame) -> axum::extract::ws::Message {
    use axum::extract::ws::Message;
    match frame {
        OutboundFrame::Text(text) => Message::Text(text.into()),
        OutboundFrame::Close => Message::Close(None),
    }
}

pub fn tungstenite_message(frame: OutboundFrame) -> tokio_tungstenite::tungstenite::Message {
    use tokio_tungstenite::tungstenite::Message;
    match frame {
        OutboundFrame::Text(text) => Message::Text(text.into()),
        OutboundFrame::Close => Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink::{drain, unfold};
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut socket = ChannelSocket::new(Side::Telephony, tx);

        socket.send_text("one".to_string()).unwrap();
        socket.close();
        socket.close();
        assert!(!socket.is_open());
        assert!(matches!(
            socket.send_text("two".to_string()),
            Err(SocketError::NotOpen(Side::Telephony))
        ));

        assert_eq!(rx.recv().await, Some(OutboundFrame::Text("one".to_string())));
        assert_eq!(rx.recv().await, Some(OutboundFrame::Close));
        drop(socket);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_writer_means_not_open() {
        let (tx, rx) = mpsc::channel(8);
        let mut socket = ChannelSocket::new(Side::Ai, tx);
        drop(rx);

        assert!(!socket.is_open());
        assert!(socket.send_text("lost".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_writer_stops_after_close_frame() {
        let (mut socket, handle) = ChannelSocket::spawn(Side::Ai, drain(), |frame| frame);
        socket.send_text("hello".to_string()).unwrap();
        socket.close();

        assert_eq!(handle.await.unwrap(), WriterExit::Closed);
        assert!(socket.send_text("late".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_stalled_peer_fills_queue_and_fails() {
        // Accepts the first frame, then never finishes writing it.
        let stalled = unfold((), |_, _: OutboundFrame| {
            std::future::pending::<Result<(), Infallible>>()
        });
        let (mut socket, _handle) = ChannelSocket::spawn(Side::Telephony, stalled, |frame| frame);

        let frame = "x".repeat(200);
        let accepted = (0..OUTBOUND_QUEUE_CAPACITY * 4)
            .take_while(|_| socket.send_text(frame.clone()).is_ok())
            .count();

        assert!(accepted <= OUTBOUND_QUEUE_CAPACITY + 1);
        assert!(matches!(
            socket.send_text(frame),
            Err(SocketError::NotOpen(Side::Telephony))
        ));
    }

    #[tokio::test]
    async fn test_close_to_departed_peer_is_expected() {
        let gone = unfold((), |_, _: OutboundFrame| {
            std::future::ready(Err::<(), _>("connection closed"))
        });
        let (mut socket, handle) = ChannelSocket::spawn(Side::Telephony, gone, |frame| frame);
        socket.close();

        assert_eq!(handle.await.unwrap(), WriterExit::PeerGone);
    }

    #[tokio::test]
    async fn test_failed_data_write_stops_writer() {
        let gone = unfold((), |_, _: OutboundFrame| {
            std::future::ready(Err::<(), _>("connection reset"))
        });
        let (mut socket, handle) = ChannelSocket::spawn(Side::Ai, gone, |frame| frame);
        socket.send_text("hello".to_string()).unwrap();

        assert_eq!(handle.await.unwrap(), WriterExit::Failed);
        assert!(!socket.is_open());
    }
}
