//! Main Entrypoint for the Callbridge API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the shared state (relay settings, session registry, AI connector).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and draining live calls on shutdown.

use anyhow::Context;
use callbridge_api::{config::Config, router::create_router, state::AppState};
use callbridge_core::registry::SessionRegistry;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Listens for the `Ctrl+C` signal, then tells every live call to hang up.
async fn shutdown_signal(registry: SessionRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    let drained = registry.cancel_all();
    info!(
        sessions = drained,
        "Received shutdown signal. Shutting down gracefully..."
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    if config.twilio.is_none() {
        info!("Telephony token credentials not set; /token is disabled.");
    }
    if config.premature_media_buffer > 0 {
        info!(
            frames = config.premature_media_buffer,
            "Buffering caller audio received before the AI session is ready."
        );
    }

    // --- 3. Initialize Shared State ---
    let bind_address = config.bind_address;
    let agent_id = config.elevenlabs_agent_id.clone();
    let app_state = Arc::new(AppState::new(config)?);
    let registry = app_state.registry.clone();

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // --- 5. Start Server ---
    info!(
        agent_id = %agent_id,
        bind_address = %bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(registry))
    .await?;

    info!("Server has shut down.");
    Ok(())
}
