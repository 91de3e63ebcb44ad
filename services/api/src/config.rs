use callbridge_core::settings::{DEFAULT_AGENT_PROMPT, RelaySettings};
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials for minting telephony access tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub api_key: String,
    pub api_secret: String,
    pub twiml_app_sid: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub elevenlabs_api_key: String,
    pub elevenlabs_agent_id: String,
    pub elevenlabs_api_base: String,
    /// Fixed AI socket URL. When set, no signed URL is requested.
    pub elevenlabs_ws_url: Option<String>,
    pub agent_prompt: String,
    pub agent_first_message: Option<String>,
    pub agent_language: Option<String>,
    pub voice_id: Option<String>,
    pub premature_media_buffer: usize,
    pub twilio: Option<TwilioCredentials>,
    pub token_ttl_secs: u64,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "4000".to_string());
            format!("0.0.0.0:{}", port)
        });
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let elevenlabs_api_key = required("ELEVENLABS_API_KEY")?;
        let elevenlabs_agent_id = required("ELEVENLABS_AGENT_ID")?;
        let elevenlabs_api_base = std::env::var("ELEVENLABS_API_BASE")
            .unwrap_or_else(|_| "https://api.elevenlabs.io".to_string())
            .trim_end_matches('/')
            .to_string();
        let elevenlabs_ws_url = optional("ELEVENLABS_WS_URL");

        let agent_prompt =
            optional("AGENT_PROMPT").unwrap_or_else(|| DEFAULT_AGENT_PROMPT.to_string());
        let agent_first_message = optional("AGENT_FIRST_MESSAGE");
        let agent_language = optional("AGENT_LANGUAGE");
        let voice_id = optional("ELEVENLABS_VOICE_ID");

        let premature_media_buffer = parse_or("PREMATURE_MEDIA_BUFFER", 0usize)?;
        let token_ttl_secs = parse_or("TOKEN_TTL_SECS", 3600u64)?;

        let twilio = match (
            optional("TWILIO_ACCOUNT_SID"),
            optional("TWILIO_API_KEY"),
            optional("TWILIO_API_SECRET"),
            optional("TWIML_APP_SID"),
        ) {
            (Some(account_sid), Some(api_key), Some(api_secret), Some(twiml_app_sid)) => {
                Some(TwilioCredentials {
                    account_sid,
                    api_key,
                    api_secret,
                    twiml_app_sid,
                })
            }
            _ => None,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            elevenlabs_api_key,
            elevenlabs_agent_id,
            elevenlabs_api_base,
            elevenlabs_ws_url,
            agent_prompt,
            agent_first_message,
            agent_language,
            voice_id,
            premature_media_buffer,
            twilio,
            token_ttl_secs,
            log_level,
        })
    }

    /// The immutable subset every relay session is constructed with.
    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            agent_prompt: self.agent_prompt.clone(),
            first_message: self.agent_first_message.clone(),
            language: self.agent_language.clone(),
            voice_id: self.voice_id.clone(),
            premature_media_buffer: self.premature_media_buffer,
        }
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    optional(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

/// Reads a variable, treating an empty value as unset.
fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
