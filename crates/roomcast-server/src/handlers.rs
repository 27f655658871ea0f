//! HTTP and WebSocket handlers for the RoomCast server.
//!
//! This module accepts peer sessions and hands them to the relay core.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use roomcast_core::{CloseHook, Hub};
use roomcast_transport::WebSocketTransport;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Shared server state.
pub struct AppState {
    /// The room registry.
    pub hub: Arc<Hub>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state with an empty hub.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            hub: Arc::new(Hub::new()),
            config,
        }
    }
}

/// Query parameters identifying the peer.
#[derive(Debug, Deserialize)]
struct JoinParams {
    room: Option<String>,
    peer: Option<String>,
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("RoomCast signaling listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}?room={{ROOM_ID}}&peer={{PEER_ID}}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app(state)).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.hub.stats();
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": stats.room_count,
        "peers": stats.peer_count,
    }))
}

/// WebSocket upgrade handler.
///
/// Plain HTTP requests get a short description of the endpoint.
async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<JoinParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(ws) = ws else {
        return banner(&state.config).into_response();
    };

    let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
    let (Some(room), Some(peer)) = (non_empty(params.room), non_empty(params.peer)) else {
        metrics::record_rejected();
        return (StatusCode::BAD_REQUEST, "missing room or peer").into_response();
    };

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state, room, peer))
}

fn banner(config: &Config) -> String {
    format!(
        "RoomCast WebSocket Server is running on port {}\nUse ws://{}:{}{}?room={{ROOM_ID}}&peer={{PEER_ID}} for WebSocket connections",
        config.port, config.host, config.port, config.transport.websocket_path
    )
}

/// Hand an upgraded WebSocket to the relay core.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>, room: String, peer: String) {
    debug!(room = %room, peer = %peer, "WebSocket connected");

    let metrics_guard = ConnectionMetricsGuard::new();
    let hub = Arc::downgrade(&state.hub);
    let (closed_room, closed_peer) = (room.clone(), peer.clone());
    let on_close: CloseHook = Box::new(move || {
        drop(metrics_guard);
        if let Some(hub) = hub.upgrade() {
            metrics::set_active_rooms(hub.stats().room_count);
        }
        info!(room = %closed_room, peer = %closed_peer, "WebSocket disconnected");
    });

    roomcast_core::accept(
        &state.hub,
        &room,
        &peer,
        WebSocketTransport::new(socket),
        state.config.connection_config(),
        Some(on_close),
    );
    metrics::set_active_rooms(state.hub.stats().room_count);
}
