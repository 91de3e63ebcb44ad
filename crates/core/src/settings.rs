use crate::convai::{
    AgentOverride, ConvaiControl, ConvaiOutbound, ConversationConfigOverride, PromptOverride,
    TtsOverride,
};

pub const DEFAULT_AGENT_PROMPT: &str =
    "You're Gary, a friendly AI assistant for a phone company. Be helpful and empathetic.";

/// Immutable per-process relay configuration, shared by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub agent_prompt: String,
    pub first_message: Option<String>,
    pub language: Option<String>,
    pub voice_id: Option<String>,
    /// Caller frames kept while the AI side is not ready. Zero drops them.
    pub premature_media_buffer: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            agent_prompt: DEFAULT_AGENT_PROMPT.to_string(),
            first_message: None,
            language: None,
            voice_id: None,
            premature_media_buffer: 0,
        }
    }
}

impl RelaySettings {
    /// The session-initiation message sent once the AI socket is attached.
    pub fn initiation_message(&self) -> ConvaiOutbound {
        ConvaiOutbound::Control(ConvaiControl::ConversationInitiationClientData {
            conversation_config_override: ConversationConfigOverride {
                agent: AgentOverride {
                    prompt: PromptOverride {
                        prompt: self.agent_prompt.clone(),
                    },
                    first_message: self.first_message.clone(),
                    language: self.language.clone(),
                },
                tts: self.voice_id.clone().map(|voice_id| TtsOverride { voice_id }),
            },
        })
    }
}
