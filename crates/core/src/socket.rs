//! The abstract send/close capability the relay needs from each connection.

use crate::error::SocketError;
use serde::Serialize;

/// One end of a bridged call, as seen by the session.
///
/// Implementations must not block: `send_text` enqueues and returns.
/// Frames handed to `send_text` are delivered in call order.
pub trait RelaySocket: Send {
    fn is_open(&self) -> bool;

    fn send_text(&mut self, text: String) -> Result<(), SocketError>;

    /// Closes the connection. Closing an already closed socket does nothing.
    fn close(&mut self);
}

/// Serializes `message` and sends it as a text frame.
pub fn send_json<S, M>(socket: &mut S, message: &M) -> Result<(), SocketError>
where
    S: RelaySocket + ?Sized,
    M: Serialize,
{
    let text = serde_json::to_string(message)?;
    socket.send_text(text)
}
