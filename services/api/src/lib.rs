//! Callbridge API Library Crate
//!
//! This library contains the web service that hosts the telephony <-> AI
//! audio relay: configuration, application state, HTTP handlers, access
//! tokens, routing, and the per-call socket driver. The `api` binary is a
//! thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod token;
pub mod ws;
