//! Call-bridge relay core.
//!
//! Transport-agnostic pieces of the telephony <-> conversational-AI relay:
//! the wire types of both sides, the pure translator between them, the
//! per-call state machine, the `RelaySession` that drives it, and the
//! process-wide `SessionRegistry`. Socket I/O lives in the service crate,
//! which only hands this crate `RelaySocket` implementations.

pub mod convai;
pub mod error;
pub mod registry;
pub mod session;
pub mod settings;
pub mod socket;
pub mod state;
pub mod telephony;
pub mod translator;

use serde::Serialize;
use std::fmt;

/// Which of the two bridged connections an event or fault belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The inbound audio stream of the phone call.
    Telephony,
    /// The outbound connection to the conversational-AI provider.
    Ai,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Telephony => write!(f, "telephony"),
            Side::Ai => write!(f, "ai"),
        }
    }
}
