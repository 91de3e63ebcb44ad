//! Media-Stream Relay
//!
//! Socket-facing half of the relay. It is structured into submodules:
//!
//! - `session`: upgrades the telephony connection and drives one `RelaySession` per call.
//! - `socket`: channel-backed `RelaySocket` handles with a dedicated writer task per connection.
//! - `provider`: opens the AI-provider connection.

pub mod provider;
pub mod session;
pub mod socket;

pub use session::media_stream_handler;
