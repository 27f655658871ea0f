//! # roomcast-core
//!
//! Room, connection and routing engine for the RoomCast signaling relay.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Hub** - Registry of rooms, the entry point for join/leave/broadcast/send-to
//! - **Room** - The set of peer connections currently in a room
//! - **Connection** - One peer's duplex session with its inbound and outbound pumps
//! - **Router** - Per-envelope dispatch (acks, presence, relay, heartbeat)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│ Connection  │────▶│   Router    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   ▲                   │
//!        │  outbound pump    │ enqueue           ▼
//!        └───────────────────┴─────────────┌─────────────┐
//!                                          │  Hub / Room │
//!                                          └─────────────┘
//! ```
//!
//! Delivery is best-effort: every connection owns a bounded outbound
//! queue and messages that do not fit are dropped rather than blocking
//! the sender.

pub mod connection;
pub mod hub;
pub mod room;
pub mod router;
pub mod stats;

pub use connection::{
    accept, CloseHook, Connection, ConnectionConfig, ConnectionId, Outbox, PeerId, RoomId,
};
pub use hub::Hub;
pub use room::Room;
pub use router::route;
pub use stats::HubStats;
