//! # roomcast-protocol
//!
//! Wire protocol definitions for the RoomCast signaling relay.
//!
//! Peers exchange JSON envelopes with the relay. An envelope names its
//! kind, the room it belongs to, its sender and an optional target peer;
//! the `payload` is opaque to the relay and passed through untouched.
//!
//! ## Envelope Types
//!
//! - `join` / `leave` - Room membership
//! - `offer` / `answer` / `candidate` - Session negotiation, relayed as-is
//! - `message` - Free-form peer messages
//! - `ping` / `pong` - Application-level heartbeat
//! - `peer_joined` - Presence notification emitted by the relay
//!
//! ## Example
//!
//! ```rust
//! use roomcast_protocol::{codec, Envelope, MessageType};
//!
//! let envelope = Envelope::new(MessageType::Offer, "lobby", "alice")
//!     .with_to("bob")
//!     .with_payload(serde_json::json!({ "sdp": "v=0" }));
//!
//! let encoded = codec::encode(&envelope).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(decoded.to, "bob");
//! ```

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, DecodeError, EncodeError};
pub use envelope::{Envelope, MessageType, SERVER_PEER_ID};
