//! One bridged call.
//!
//! `RelaySession` owns both socket handles and applies the lifecycle
//! transition table to every inbound event. It is purely synchronous: the
//! caller feeds it raw messages and socket signals and acts on the returned
//! `Directive`. The only thing it cannot do itself is open the AI-side
//! connection, which it requests with `Directive::ConnectAi`.

use crate::{
    Side,
    error::{RegistryError, SocketError},
    registry::{SessionRegistry, SessionSnapshot},
    settings::RelaySettings,
    socket::{RelaySocket, send_json},
    state::SessionState,
    translator::{
        AudioFrame, Event, ProviderControl, TelephonyControl, classify_inbound, to_ai_envelope,
        to_ai_pong, to_telephony_clear, to_telephony_envelope,
    },
};
use std::{collections::VecDeque, fmt::Display, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What the driver must do after handing an event to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep reading from both sides.
    Continue,
    /// Open the AI-side connection, then call `attach_ai` or
    /// `ai_connect_failed` before reading any further telephony frames.
    ConnectAi,
    /// The session is closed; stop driving it.
    Terminated,
}

pub struct RelaySession<T: RelaySocket, A: RelaySocket> {
    id: Uuid,
    state: SessionState,
    telephony: T,
    ai: Option<A>,
    stream_sid: Option<String>,
    pending_audio: VecDeque<AudioFrame>,
    settings: Arc<RelaySettings>,
    registry: SessionRegistry,
    cancel: CancellationToken,
}

impl<T: RelaySocket, A: RelaySocket> RelaySession<T, A> {
    /// Creates a session for a freshly accepted telephony connection and
    /// registers it.
    pub fn new(
        settings: Arc<RelaySettings>,
        registry: SessionRegistry,
        telephony: T,
    ) -> Result<Self, RegistryError> {
        Self::with_id(Uuid::new_v4(), settings, registry, telephony)
    }

    pub fn with_id(
        id: Uuid,
        settings: Arc<RelaySettings>,
        registry: SessionRegistry,
        telephony: T,
    ) -> Result<Self, RegistryError> {
        let cancel = CancellationToken::new();
        registry.register(SessionSnapshot::new(id), cancel.clone())?;
        info!(session_id = %id, "Relay session created. Awaiting start event...");

        Ok(Self {
            id,
            state: SessionState::AwaitingStart,
            telephony,
            ai: None,
            stream_sid: None,
            pending_audio: VecDeque::new(),
            settings,
            registry,
            cancel,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn pending_audio_len(&self) -> usize {
        self.pending_audio.len()
    }

    /// Token cancelled when the registry drains this session.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Handles one raw message from the telephony socket.
    pub fn on_telephony_message(&mut self, raw: &str) -> Directive {
        if self.is_closed() {
            return Directive::Terminated;
        }

        match classify_inbound(raw, Side::Telephony) {
            Event::Start {
                stream_sid,
                call_sid,
            } => self.handle_start(stream_sid, call_sid),
            Event::Media(frame) => self.handle_media(frame),
            Event::Stop => self.handle_stop(),
            Event::TelephonyControl(control) => {
                match control {
                    TelephonyControl::Connected => debug!("Telephony stream connected"),
                    TelephonyControl::Mark { name } => debug!(?name, "Telephony mark"),
                    TelephonyControl::Dtmf { digit } => info!(?digit, "Caller pressed a key"),
                }
                Directive::Continue
            }
            Event::Unknown(unknown) => {
                warn!(%unknown, "Discarding unrecognized telephony message");
                Directive::Continue
            }
            other => {
                debug!(?other, "Ignoring provider event on the telephony socket");
                Directive::Continue
            }
        }
    }

    /// Attaches the freshly opened AI-side socket and starts streaming.
    pub fn attach_ai(&mut self, mut ai: A) -> Directive {
        if self.state != SessionState::AwaitingStart || self.stream_sid.is_none() {
            warn!(state = %self.state, "AI connection opened for a session that cannot stream");
            ai.close();
            if self.is_closed() {
                return Directive::Terminated;
            }
            return self.finish("AI connection attached out of order");
        }

        self.ai = Some(ai);
        self.transition(SessionState::Streaming);
        info!("AI connection attached. Streaming.");

        let init = self.settings.initiation_message();
        if let Err(e) = self.send_to_ai(&init) {
            error!(error = %e, "Failed to send conversation initiation to AI provider");
            return self.finish("initiation send failed");
        }

        while let Some(frame) = self.pending_audio.pop_front() {
            if self.forward_to_ai(frame) == Directive::Terminated {
                return Directive::Terminated;
            }
        }
        Directive::Continue
    }

    /// The AI-side connection could not be established. Terminal.
    pub fn ai_connect_failed(&mut self, err: &dyn Display) -> Directive {
        error!(error = %err, "Failed to connect to AI provider");
        self.finish("AI connection failed")
    }

    /// Handles one raw message from the AI socket.
    pub fn on_ai_message(&mut self, raw: &str) -> Directive {
        if self.is_closed() {
            return Directive::Terminated;
        }

        match classify_inbound(raw, Side::Ai) {
            Event::ProviderAudio(frame) => {
                if self.state != SessionState::Streaming {
                    debug!(state = %self.state, "Discarding AI audio outside of streaming");
                    return Directive::Continue;
                }
                if frame.is_empty() {
                    debug!("Discarding empty AI audio event");
                    return Directive::Continue;
                }
                self.forward_to_telephony(frame)
            }
            Event::ProviderControl(control) => self.handle_provider_control(control),
            Event::Unknown(unknown) => {
                debug!(%unknown, "Discarding unhandled AI provider message");
                Directive::Continue
            }
            other => {
                debug!(?other, "Ignoring telephony event on the AI socket");
                Directive::Continue
            }
        }
    }

    /// Either socket closed. Terminal; repeated calls are no-ops.
    pub fn on_socket_closed(&mut self, side: Side) -> Directive {
        if self.is_closed() {
            return Directive::Terminated;
        }
        info!(%side, "Socket closed");
        self.finish("socket closed")
    }

    /// Either socket reported an error. Terminal; repeated calls are no-ops.
    pub fn on_socket_error(&mut self, side: Side, err: &dyn Display) -> Directive {
        if self.is_closed() {
            return Directive::Terminated;
        }
        error!(%side, error = %err, "Socket error");
        self.finish("socket error")
    }

    /// Closes the session from outside, e.g. at process shutdown.
    pub fn shutdown(&mut self, reason: &str) -> Directive {
        if self.is_closed() {
            return Directive::Terminated;
        }
        info!(reason, "Shutting down relay session");
        self.finish(reason)
    }

    fn handle_start(&mut self, stream_sid: String, call_sid: Option<String>) -> Directive {
        if self.state != SessionState::AwaitingStart || self.stream_sid.is_some() {
            warn!(state = %self.state, "Ignoring repeated start event");
            return Directive::Continue;
        }
        if stream_sid.is_empty() {
            warn!("Ignoring start event without a stream sid");
            return Directive::Continue;
        }

        info!(%stream_sid, ?call_sid, "Telephony stream started");
        self.registry.update(self.id, |s| {
            s.stream_sid = Some(stream_sid.clone());
            s.call_sid = call_sid;
        });
        self.stream_sid = Some(stream_sid);
        Directive::ConnectAi
    }

    fn handle_media(&mut self, frame: AudioFrame) -> Directive {
        match self.state {
            SessionState::Streaming => self.forward_to_ai(frame),
            SessionState::AwaitingStart => {
                let capacity = self.settings.premature_media_buffer;
                if capacity == 0 {
                    warn!("Received media before the AI session is ready; dropping frame");
                    return Directive::Continue;
                }
                if self.pending_audio.len() >= capacity {
                    self.pending_audio.pop_front();
                    warn!(capacity, "Premature media buffer full; dropping oldest frame");
                }
                self.pending_audio.push_back(frame);
                Directive::Continue
            }
            SessionState::Closing | SessionState::Closed => Directive::Terminated,
        }
    }

    fn handle_stop(&mut self) -> Directive {
        info!(state = %self.state, "Telephony stream stopped");
        self.finish("call ended")
    }

    fn handle_provider_control(&mut self, control: ProviderControl) -> Directive {
        match control {
            ProviderControl::Ping { event_id } => {
                if let Err(e) = self.send_to_ai(&to_ai_pong(event_id)) {
                    error!(error = %e, "Failed to answer AI provider ping");
                    return self.finish("pong send failed");
                }
                Directive::Continue
            }
            ProviderControl::Interruption => {
                let Some(stream_sid) = self.stream_sid.as_deref() else {
                    return Directive::Continue;
                };
                debug!("Caller interrupted the agent; clearing queued audio");
                let result = to_telephony_clear(stream_sid)
                    .map_err(|e| e.to_string())
                    .and_then(|clear| {
                        send_json(&mut self.telephony, &clear).map_err(|e| e.to_string())
                    });
                if let Err(e) = result {
                    error!(error = %e, "Failed to send clear to telephony");
                    return self.finish("clear send failed");
                }
                Directive::Continue
            }
            ProviderControl::InitiationMetadata { conversation_id } => {
                info!(%conversation_id, "AI conversation initiated");
                self.registry
                    .update(self.id, |s| s.conversation_id = Some(conversation_id));
                Directive::Continue
            }
            ProviderControl::AgentResponse { text } => {
                debug!(agent_response = %text, "Agent response");
                Directive::Continue
            }
            ProviderControl::UserTranscript { text } => {
                debug!(user_transcript = %text, "User transcript");
                Directive::Continue
            }
        }
    }

    fn forward_to_ai(&mut self, frame: AudioFrame) -> Directive {
        if let Err(e) = self.send_to_ai(&to_ai_envelope(&frame)) {
            error!(error = %e, "Failed to forward caller audio to AI provider");
            return self.finish("AI peer unavailable");
        }
        self.registry.update(self.id, |s| s.frames_to_ai += 1);
        Directive::Continue
    }

    fn forward_to_telephony(&mut self, frame: AudioFrame) -> Directive {
        let envelope = match to_telephony_envelope(self.stream_sid.as_deref().unwrap_or(""), &frame)
        {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "Cannot address agent audio to telephony");
                return self.finish("stream sid missing");
            }
        };

        let result = if self.telephony.is_open() {
            send_json(&mut self.telephony, &envelope)
        } else {
            Err(SocketError::NotOpen(Side::Telephony))
        };
        if let Err(e) = result {
            error!(error = %e, "Failed to forward agent audio to telephony");
            return self.finish("telephony peer unavailable");
        }
        self.registry.update(self.id, |s| s.frames_to_telephony += 1);
        Directive::Continue
    }

    fn send_to_ai<M: serde::Serialize>(&mut self, message: &M) -> Result<(), SocketError> {
        match self.ai.as_mut() {
            Some(ai) if ai.is_open() => send_json(ai, message),
            _ => Err(SocketError::NotOpen(Side::Ai)),
        }
    }

    fn transition(&mut self, next: SessionState) {
        if let Err(e) = self.state.advance(next) {
            // Unreachable from the public API; keep the current state.
            error!(error = %e, "Rejected session transition");
            return;
        }
        self.registry.update(self.id, |s| s.state = next);
    }

    /// CLOSING -> close both sockets -> CLOSED -> deregister.
    fn finish(&mut self, reason: &str) -> Directive {
        if self.is_closed() {
            return Directive::Terminated;
        }
        if self.state != SessionState::Closing {
            self.transition(SessionState::Closing);
        }

        if let Some(ai) = self.ai.as_mut() {
            ai.close();
        }
        self.telephony.close();
        self.pending_audio.clear();

        self.transition(SessionState::Closed);
        let snapshot = self.registry.deregister(self.id);
        info!(
            reason,
            frames_to_ai = snapshot.as_ref().map_or(0, |s| s.frames_to_ai),
            frames_to_telephony = snapshot.as_ref().map_or(0, |s| s.frames_to_telephony),
            "Relay session closed"
        );
        Directive::Terminated
    }
}

impl<T: RelaySocket, A: RelaySocket> Drop for RelaySession<T, A> {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.finish("session dropped");
        }
    }
}
