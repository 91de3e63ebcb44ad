//! Wire format of the telephony provider's media-stream socket.
//!
//! Inbound events are discriminated by `event`. Only the fields the relay
//! needs are modelled; everything else the provider sends is ignored.

use serde::{Deserialize, Serialize};

/// Events received from the telephony media stream.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyInbound {
    /// First message on a fresh stream, before `start`.
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },
    /// Stream metadata, including the correlation token.
    Start { start: StartMeta },
    /// One chunk of caller audio.
    Media { media: InboundMedia },
    /// The call has ended.
    Stop {
        #[serde(default)]
        stop: Option<serde_json::Value>,
    },
    /// Playback acknowledgement for a previously sent mark.
    Mark {
        #[serde(default)]
        mark: Option<MarkMeta>,
    },
    /// A keypad digit pressed by the caller.
    Dtmf {
        #[serde(default)]
        dtmf: Option<DtmfMeta>,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartMeta {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InboundMedia {
    pub payload: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MarkMeta {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DtmfMeta {
    pub digit: String,
}

/// Messages the relay sends back down the media stream.
///
/// Every variant carries the stream's `streamSid`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyOutbound {
    /// Agent audio to play to the caller.
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
    /// Discard any agent audio still queued for playback.
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OutboundMedia {
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_event_ignores_extra_fields() {
        let raw = json!({
            "event": "start",
            "sequenceNumber": "1",
            "streamSid": "MZ123",
            "start": {
                "streamSid": "MZ123",
                "callSid": "CA456",
                "tracks": ["inbound"],
                "mediaFormat": { "encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1 }
            }
        });

        let event: TelephonyInbound = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event,
            TelephonyInbound::Start {
                start: StartMeta {
                    stream_sid: "MZ123".to_string(),
                    call_sid: Some("CA456".to_string()),
                }
            }
        );
    }

    #[test]
    fn test_bare_stop_event() {
        let event: TelephonyInbound = serde_json::from_str(r#"{"event":"stop"}"#).unwrap();
        assert!(matches!(event, TelephonyInbound::Stop { stop: None }));
    }

    #[test]
    fn test_outbound_media_shape() {
        let msg = TelephonyOutbound::Media {
            stream_sid: "SS1".to_string(),
            media: OutboundMedia {
                payload: "Cg==".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "event": "media", "streamSid": "SS1", "media": { "payload": "Cg==" } })
        );
    }

    #[test]
    fn test_outbound_clear_shape() {
        let msg = TelephonyOutbound::Clear {
            stream_sid: "SS1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "event": "clear", "streamSid": "SS1" })
        );
    }
}
