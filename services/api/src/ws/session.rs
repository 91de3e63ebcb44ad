//! Drives one bridged call from socket upgrade to teardown.

use super::{
    provider::{AiConnector, AiStream},
    socket::{ChannelSocket, axum_message},
};
use crate::state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use callbridge_core::{
    Side,
    session::{Directive, RelaySession},
};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{Instrument, debug, error, field, info, warn};

type CallSession = RelaySession<ChannelSocket, ChannelSocket>;

/// Axum handler that upgrades the telephony media stream to a WebSocket.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_call(socket, state))
}

/// Entry point for one accepted telephony connection.
async fn handle_call(socket: WebSocket, state: Arc<AppState>) {
    let (sink, telephony_rx) = socket.split();
    let (telephony, telephony_writer) = ChannelSocket::spawn(Side::Telephony, sink, axum_message);

    let session: CallSession = match RelaySession::new(
        state.relay_settings.clone(),
        state.registry.clone(),
        telephony,
    ) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Failed to register relay session");
            return;
        }
    };

    let span = tracing::info_span!(
        "relay_session",
        session_id = %session.id(),
        stream_sid = field::Empty
    );
    run_relay(session, telephony_rx, state.connector.as_ref())
        .instrument(span)
        .await;

    // Let the close frame reach the caller before the task ends.
    let _ = telephony_writer.await;
}

/// The per-call event loop.
///
/// Events from each socket are handled one at a time, in arrival order.
async fn run_relay<R>(mut session: CallSession, mut telephony_rx: R, connector: &dyn AiConnector)
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let cancel = session.cancellation();
    let mut ai_rx: Option<AiStream> = None;

    loop {
        let directive = tokio::select! {
            _ = cancel.cancelled() => session.shutdown("server shutting down"),
            msg = telephony_rx.next() => on_telephony_frame(&mut session, msg),
            msg = next_ai_frame(&mut ai_rx) => on_ai_frame(&mut session, msg),
        };

        match directive {
            Directive::Continue => {}
            Directive::Terminated => break,
            Directive::ConnectAi => {
                if let Some(stream_sid) = session.stream_sid() {
                    tracing::Span::current().record("stream_sid", stream_sid);
                }
                info!("Connecting to AI provider...");

                let directive =
                    connect_ai(&mut session, &mut telephony_rx, connector, &mut ai_rx).await;
                if directive == Directive::Terminated {
                    break;
                }
            }
        }
    }

    info!(state = %session.state(), "Relay session finished.");
}

/// Opens the AI side while still watching the caller.
///
/// Frames the caller sends meanwhile are held and replayed, in order, once the
/// AI socket is attached. A hangup or socket error ends the session at once and
/// abandons the pending connect.
async fn connect_ai<R>(
    session: &mut CallSession,
    telephony_rx: &mut R,
    connector: &dyn AiConnector,
    ai_rx: &mut Option<AiStream>,
) -> Directive
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let cancel = session.cancellation();
    let mut connect = connector.connect();
    let mut held = Vec::new();

    let outcome = loop {
        tokio::select! {
            _ = cancel.cancelled() => return session.shutdown("server shutting down"),
            result = &mut connect => break result,
            msg = telephony_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    return on_telephony_frame(session, msg);
                }
                Some(Ok(frame)) => held.push(frame),
            },
        }
    };

    let mut directive = match outcome {
        Ok(connection) => {
            *ai_rx = Some(connection.inbound);
            session.attach_ai(connection.socket)
        }
        Err(e) => session.ai_connect_failed(&e),
    };
    if !held.is_empty() {
        debug!(frames = held.len(), "Replaying caller frames received while connecting");
    }
    for frame in held {
        if directive == Directive::Terminated {
            break;
        }
        directive = on_telephony_frame(session, Some(Ok(frame)));
    }
    directive
}

fn on_telephony_frame(
    session: &mut CallSession,
    msg: Option<Result<Message, axum::Error>>,
) -> Directive {
    match msg {
        Some(Ok(Message::Text(text))) => session.on_telephony_message(text.as_str()),
        Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
            Ok(text) => session.on_telephony_message(text),
            Err(_) => {
                warn!("Discarding non-UTF-8 binary frame from telephony");
                Directive::Continue
            }
        },
        Some(Ok(Message::Ping(_) | Message::Pong(_))) => Directive::Continue,
        Some(Ok(Message::Close(_))) | None => session.on_socket_closed(Side::Telephony),
        Some(Err(e)) => session.on_socket_error(Side::Telephony, &e),
    }
}

fn on_ai_frame(
    session: &mut CallSession,
    msg: Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>>,
) -> Directive {
    match msg {
        Some(Ok(WsMessage::Text(text))) => session.on_ai_message(text.as_str()),
        Some(Ok(WsMessage::Binary(_))) => {
            debug!("Ignoring binary frame from AI provider");
            Directive::Continue
        }
        Some(Ok(WsMessage::Close(_))) | None => session.on_socket_closed(Side::Ai),
        Some(Ok(_)) => Directive::Continue,
        Some(Err(e)) => session.on_socket_error(Side::Ai, &e),
    }
}

/// Next frame from the AI socket, or never if it is not open yet.
async fn next_ai_frame(
    ai_rx: &mut Option<AiStream>,
) -> Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>> {
    match ai_rx.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
