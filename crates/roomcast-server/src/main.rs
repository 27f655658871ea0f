//! # RoomCast Server
//!
//! WebSocket signaling relay: peers join rooms and exchange negotiation
//! and presence messages.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (127.0.0.1:8888)
//! roomcast
//!
//! # Run with environment overrides
//! ROOMCAST_HOST=0.0.0.0 ROOMCAST_PORT=8888 roomcast
//!
//! # Connect a peer
//! websocat "ws://localhost:8888/ws?room=lobby&peer=alice"
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=debug,roomcast_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting RoomCast server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
