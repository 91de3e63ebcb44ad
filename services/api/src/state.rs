//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources handed to every handler and relay session.

use crate::{
    config::Config,
    ws::provider::{AiConnector, elevenlabs::ElevenLabsConnector},
};
use callbridge_core::{registry::SessionRegistry, settings::RelaySettings};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay_settings: Arc<RelaySettings>,
    pub registry: SessionRegistry,
    pub connector: Arc<dyn AiConnector>,
}

impl AppState {
    /// Builds the state with the ElevenLabs connector described by `config`.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let connector = Arc::new(ElevenLabsConnector::from_config(&config)?);
        Ok(Self::with_connector(config, connector))
    }

    pub fn with_connector(config: Config, connector: Arc<dyn AiConnector>) -> Self {
        Self {
            relay_settings: Arc::new(config.relay_settings()),
            config: Arc::new(config),
            registry: SessionRegistry::new(),
            connector,
        }
    }
}
