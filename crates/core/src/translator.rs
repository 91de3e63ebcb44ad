//! Pure mapping between the telephony and AI-provider wire formats.
//!
//! Nothing here performs I/O or holds state. Audio payloads are carried as
//! the base64 text they arrived as and are never decoded.

use crate::{
    Side,
    convai::{ConvaiControl, ConvaiInbound, ConvaiOutbound, UserAudioChunk},
    error::TranslateError,
    telephony::{OutboundMedia, TelephonyInbound, TelephonyOutbound},
};
use std::fmt;

/// One opaque block of base64 audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame(String);

impl AudioFrame {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for AudioFrame {
    fn from(payload: String) -> Self {
        Self(payload)
    }
}

/// Non-audio telephony events that carry no transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelephonyControl {
    Connected,
    Mark { name: Option<String> },
    Dtmf { digit: Option<String> },
}

/// Non-audio provider events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderControl {
    Ping { event_id: u64 },
    Interruption,
    InitiationMetadata { conversation_id: String },
    AgentResponse { text: String },
    UserTranscript { text: String },
}

/// A classified inbound message from either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start {
        stream_sid: String,
        call_sid: Option<String>,
    },
    Media(AudioFrame),
    Stop,
    TelephonyControl(TelephonyControl),
    ProviderAudio(AudioFrame),
    ProviderControl(ProviderControl),
    Unknown(UnknownEvent),
}

/// A message that could not be classified, kept only for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent {
    pub side: Side,
    /// The discriminator value, when the message was at least a JSON object carrying one.
    pub discriminator: Option<String>,
    pub reason: String,
}

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.discriminator {
            Some(d) => write!(f, "{} event '{}': {}", self.side, d, self.reason),
            None => write!(f, "{} message: {}", self.side, self.reason),
        }
    }
}

/// Wraps caller audio in the provider's input-chunk message.
pub fn to_ai_envelope(frame: &AudioFrame) -> ConvaiOutbound {
    ConvaiOutbound::Audio(UserAudioChunk {
        user_audio_chunk: frame.as_str().to_string(),
    })
}

/// Wraps agent audio in the telephony media event for `stream_sid`.
pub fn to_telephony_envelope(
    stream_sid: &str,
    frame: &AudioFrame,
) -> Result<TelephonyOutbound, TranslateError> {
    if stream_sid.is_empty() {
        return Err(TranslateError::MissingStreamSid);
    }
    Ok(TelephonyOutbound::Media {
        stream_sid: stream_sid.to_string(),
        media: OutboundMedia {
            payload: frame.as_str().to_string(),
        },
    })
}

/// Builds the telephony `clear` event for `stream_sid`.
pub fn to_telephony_clear(stream_sid: &str) -> Result<TelephonyOutbound, TranslateError> {
    if stream_sid.is_empty() {
        return Err(TranslateError::MissingStreamSid);
    }
    Ok(TelephonyOutbound::Clear {
        stream_sid: stream_sid.to_string(),
    })
}

pub fn to_ai_pong(event_id: u64) -> ConvaiOutbound {
    ConvaiOutbound::Control(ConvaiControl::Pong { event_id })
}

/// Decodes and classifies a raw inbound message.
///
/// Never fails: anything that does not decode into a known event of `side`
/// comes back as `Event::Unknown` with the reason recorded.
pub fn classify_inbound(raw: &str, side: Side) -> Event {
    let result = match side {
        Side::Telephony => serde_json::from_str::<TelephonyInbound>(raw).map(from_telephony),
        Side::Ai => serde_json::from_str::<ConvaiInbound>(raw).map(from_convai),
    };

    result.unwrap_or_else(|e| {
        Event::Unknown(UnknownEvent {
            side,
            discriminator: discriminator(raw, side),
            reason: e.to_string(),
        })
    })
}

fn from_telephony(event: TelephonyInbound) -> Event {
    match event {
        TelephonyInbound::Connected { .. } => Event::TelephonyControl(TelephonyControl::Connected),
        TelephonyInbound::Start { start } => Event::Start {
            stream_sid: start.stream_sid,
            call_sid: start.call_sid,
        },
        TelephonyInbound::Media { media } => Event::Media(AudioFrame(media.payload)),
        TelephonyInbound::Stop { .. } => Event::Stop,
        TelephonyInbound::Mark { mark } => Event::TelephonyControl(TelephonyControl::Mark {
            name: mark.map(|m| m.name),
        }),
        TelephonyInbound::Dtmf { dtmf } => Event::TelephonyControl(TelephonyControl::Dtmf {
            digit: dtmf.map(|d| d.digit),
        }),
    }
}

fn from_convai(event: ConvaiInbound) -> Event {
    match event {
        ConvaiInbound::Audio { audio_event } => {
            Event::ProviderAudio(AudioFrame(audio_event.audio_base_64))
        }
        ConvaiInbound::Ping { ping_event } => Event::ProviderControl(ProviderControl::Ping {
            event_id: ping_event.event_id,
        }),
        ConvaiInbound::Interruption { .. } => Event::ProviderControl(ProviderControl::Interruption),
        ConvaiInbound::ConversationInitiationMetadata {
            conversation_initiation_metadata_event,
        } => Event::ProviderControl(ProviderControl::InitiationMetadata {
            conversation_id: conversation_initiation_metadata_event.conversation_id,
        }),
        ConvaiInbound::AgentResponse {
            agent_response_event,
        } => Event::ProviderControl(ProviderControl::AgentResponse {
            text: agent_response_event.agent_response,
        }),
        ConvaiInbound::UserTranscript {
            user_transcription_event,
        } => Event::ProviderControl(ProviderControl::UserTranscript {
            text: user_transcription_event.user_transcript,
        }),
    }
}

fn discriminator(raw: &str, side: Side) -> Option<String> {
    let key = match side {
        Side::Telephony => "event",
        Side::Ai => "type",
    };
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()?
        .get(key)?
        .as_str()
        .map(str::to_string)
}
