//! Wire format of the conversational-AI provider's socket.
//!
//! Server events are discriminated by `type`. Client messages are either a
//! bare audio chunk (`{"user_audio_chunk": ..}`) or a typed control message.

use serde::{Deserialize, Serialize};

/// Events received from the AI provider.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvaiInbound {
    Audio {
        audio_event: AudioEvent,
    },
    Ping {
        ping_event: PingEvent,
    },
    Interruption {
        #[serde(default)]
        interruption_event: Option<InterruptionEvent>,
    },
    ConversationInitiationMetadata {
        conversation_initiation_metadata_event: InitiationMetadata,
    },
    AgentResponse {
        agent_response_event: AgentResponseEvent,
    },
    UserTranscript {
        user_transcription_event: UserTranscriptionEvent,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AudioEvent {
    #[serde(default)]
    pub audio_base_64: String,
    #[serde(default)]
    pub event_id: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PingEvent {
    pub event_id: u64,
    #[serde(default)]
    pub ping_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InterruptionEvent {
    #[serde(default)]
    pub event_id: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InitiationMetadata {
    pub conversation_id: String,
    #[serde(default)]
    pub agent_output_audio_format: Option<String>,
    #[serde(default)]
    pub user_input_audio_format: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AgentResponseEvent {
    pub agent_response: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserTranscriptionEvent {
    pub user_transcript: String,
}

/// Messages the relay sends to the AI provider.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConvaiOutbound {
    Audio(UserAudioChunk),
    Control(ConvaiControl),
}

/// A chunk of caller audio, base64 text exactly as received.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserAudioChunk {
    pub user_audio_chunk: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvaiControl {
    /// Sent once, right after the socket opens.
    ConversationInitiationClientData {
        conversation_config_override: ConversationConfigOverride,
    },
    /// Keep-alive answer to a provider `ping`.
    Pong { event_id: u64 },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ConversationConfigOverride {
    pub agent: AgentOverride,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsOverride>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AgentOverride {
    pub prompt: PromptOverride,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PromptOverride {
    pub prompt: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TtsOverride {
    pub voice_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audio_event_parses() {
        let raw = json!({
            "type": "audio",
            "audio_event": { "audio_base_64": "Cg==", "event_id": 7 }
        });
        let event: ConvaiInbound = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event,
            ConvaiInbound::Audio {
                audio_event: AudioEvent {
                    audio_base_64: "Cg==".to_string(),
                    event_id: Some(7),
                }
            }
        );
    }

    #[test]
    fn test_ping_event_parses() {
        let raw = json!({ "type": "ping", "ping_event": { "event_id": 3, "ping_ms": 120 } });
        let event: ConvaiInbound = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            event,
            ConvaiInbound::Ping { ping_event: PingEvent { event_id: 3, .. } }
        ));
    }

    #[test]
    fn test_audio_chunk_is_untagged() {
        let msg = ConvaiOutbound::Audio(UserAudioChunk {
            user_audio_chunk: "QQ==".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "user_audio_chunk": "QQ==" })
        );
    }

    #[test]
    fn test_pong_shape() {
        let msg = ConvaiOutbound::Control(ConvaiControl::Pong { event_id: 3 });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "pong", "event_id": 3 })
        );
    }

    #[test]
    fn test_initiation_omits_unset_overrides() {
        let msg = ConvaiOutbound::Control(ConvaiControl::ConversationInitiationClientData {
            conversation_config_override: ConversationConfigOverride {
                agent: AgentOverride {
                    prompt: PromptOverride {
                        prompt: "Be brief.".to_string(),
                    },
                    first_message: None,
                    language: None,
                },
                tts: None,
            },
        });
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "conversation_initiation_client_data",
                "conversation_config_override": {
                    "agent": { "prompt": { "prompt": "Be brief." } }
                }
            })
        );
    }
}
