//! # roomcast-transport
//!
//! Transport abstraction layer for the RoomCast signaling relay.
//!
//! A transport is an already-established duplex message channel to one
//! peer. The relay splits it into a receiving half and a sending half so
//! that inbound and outbound traffic can be pumped independently.
//!
//! - **WebSocket** - axum WebSocket sessions (feature `websocket`)
//! - **Memory** - in-process channel pair, for tests and embedding
//!
//! ```rust,ignore
//! use roomcast_transport::{Transport, TransportStream};
//!
//! async fn drain(transport: impl Transport) {
//!     let (_sink, mut stream) = transport.split();
//!     while let Ok(Some(inbound)) = stream.recv().await {
//!         // Process message
//!     }
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use traits::{Inbound, Transport, TransportError, TransportSink, TransportStream};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
