//! Envelope types for the RoomCast protocol.
//!
//! An envelope is the unit of communication between a peer and the relay.
//! Envelopes are JSON objects; only the routing fields are interpreted by
//! the relay, the payload is carried through verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Sender id used by the relay for envelopes it originates (acks, pongs).
pub const SERVER_PEER_ID: &str = "server";

/// Envelope type identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Join,
    Leave,
    Message,
    Offer,
    Answer,
    Candidate,
    Ping,
    Pong,
    PeerJoined,
    /// Any type string the relay does not know about.
    Unknown(String),
}

impl MessageType {
    /// Get the wire name of this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Join => "join",
            MessageType::Leave => "leave",
            MessageType::Message => "message",
            MessageType::Offer => "offer",
            MessageType::Answer => "answer",
            MessageType::Candidate => "candidate",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::PeerJoined => "peer_joined",
            MessageType::Unknown(other) => other,
        }
    }

    /// Whether envelopes of this type are relayed between peers.
    #[must_use]
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            MessageType::Message | MessageType::Offer | MessageType::Answer | MessageType::Candidate
        )
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "join" => MessageType::Join,
            "leave" => MessageType::Leave,
            "message" => MessageType::Message,
            "offer" => MessageType::Offer,
            "answer" => MessageType::Answer,
            "candidate" => MessageType::Candidate,
            "ping" => MessageType::Ping,
            "pong" => MessageType::Pong,
            "peer_joined" => MessageType::PeerJoined,
            _ => MessageType::Unknown(value),
        }
    }
}

impl From<MessageType> for String {
    fn from(mt: MessageType) -> String {
        match mt {
            MessageType::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol envelope.
///
/// Empty `room_id`, `from` and `to` are omitted on the wire, as is a
/// `null` payload. An empty `to` means "everyone else in the room".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEnvelope")]
pub struct Envelope {
    /// Envelope type.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Room the envelope belongs to.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub room_id: String,
    /// Sending peer.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from: String,
    /// Target peer, empty for a room broadcast.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub to: String,
    /// Opaque payload.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Envelope {
    /// Create a new envelope with an empty payload and no target.
    #[must_use]
    pub fn new(kind: MessageType, room_id: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            kind,
            room_id: room_id.into(),
            from: from.into(),
            to: String::new(),
            payload: Value::Null,
        }
    }

    /// Set the target peer.
    #[must_use]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether this envelope is addressed to a single peer.
    #[must_use]
    pub fn is_directed(&self) -> bool {
        !self.to.is_empty()
    }
}

/// The decoded shape of an envelope, including legacy fields.
///
/// Older clients sent `room` instead of `room_id`, and put negotiation
/// data under `offer`/`answer`/`candidate` instead of `payload`.
#[derive(Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: MessageType,
    #[serde(default)]
    room_id: Option<String>,
    #[serde(default, rename = "roomId")]
    room_id_camel: Option<String>,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    offer: Value,
    #[serde(default)]
    answer: Value,
    #[serde(default)]
    candidate: Value,
}

impl From<WireEnvelope> for Envelope {
    fn from(wire: WireEnvelope) -> Self {
        let room_id = [wire.room_id, wire.room_id_camel, wire.room]
            .into_iter()
            .flatten()
            .find(|r| !r.is_empty())
            .unwrap_or_default();

        let payload = if wire.payload.is_null() {
            let legacy = [
                (MessageType::Offer, wire.offer),
                (MessageType::Answer, wire.answer),
                (MessageType::Candidate, wire.candidate),
            ];
            fold_legacy_payload(&wire.kind, legacy)
        } else {
            wire.payload
        };

        Self {
            kind: wire.kind,
            room_id,
            from: wire.from.unwrap_or_default(),
            to: wire.to.unwrap_or_default(),
            payload,
        }
    }
}

/// Pick the legacy field matching the envelope type, else the first populated one.
fn fold_legacy_payload(kind: &MessageType, legacy: [(MessageType, Value); 3]) -> Value {
    let mut fallback = Value::Null;
    for (field_kind, value) in legacy {
        if value.is_null() {
            continue;
        }
        if &field_kind == kind {
            return value;
        }
        if fallback.is_null() {
            fallback = value;
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_names() {
        assert_eq!(MessageType::PeerJoined.as_str(), "peer_joined");
        assert_eq!(MessageType::from("candidate".to_string()), MessageType::Candidate);
        assert_eq!(
            MessageType::from("renegotiate".to_string()),
            MessageType::Unknown("renegotiate".to_string())
        );
        assert_eq!(String::from(MessageType::Unknown("x".into())), "x");
    }

    #[test]
    fn test_relayed_types() {
        assert!(MessageType::Offer.is_relayed());
        assert!(MessageType::Message.is_relayed());
        assert!(!MessageType::Ping.is_relayed());
        assert!(!MessageType::PeerJoined.is_relayed());
    }

    #[test]
    fn test_legacy_room_field() {
        let env: Envelope = serde_json::from_value(json!({"type": "join", "room": "R1"})).unwrap();
        assert_eq!(env.room_id, "R1");

        let env: Envelope =
            serde_json::from_value(json!({"type": "join", "room_id": "R2", "room": "R1"})).unwrap();
        assert_eq!(env.room_id, "R2");

        let env: Envelope = serde_json::from_value(json!({"type": "join", "roomId": "R3"})).unwrap();
        assert_eq!(env.room_id, "R3");

        let env: Envelope =
            serde_json::from_value(json!({"type": "join", "room_id": "R4", "roomId": "R4"}))
                .unwrap();
        assert_eq!(env.room_id, "R4");

        let env: Envelope =
            serde_json::from_value(json!({"type": "join", "room_id": "", "roomId": "R5", "room": "R6"}))
                .unwrap();
        assert_eq!(env.room_id, "R5");
    }

    #[test]
    fn test_legacy_payload_fields() {
        let env: Envelope =
            serde_json::from_value(json!({"type": "offer", "offer": {"sdp": "x"}})).unwrap();
        assert_eq!(env.payload, json!({"sdp": "x"}));

        let env: Envelope = serde_json::from_value(json!({
            "type": "answer",
            "offer": {"sdp": "stale"},
            "answer": {"sdp": "y"}
        }))
        .unwrap();
        assert_eq!(env.payload, json!({"sdp": "y"}));

        // An explicit payload always wins.
        let env: Envelope = serde_json::from_value(json!({
            "type": "candidate",
            "payload": {"c": 1},
            "candidate": {"c": 2}
        }))
        .unwrap();
        assert_eq!(env.payload, json!({"c": 1}));
    }

    #[test]
    fn test_serialize_omits_empty_fields() {
        let env = Envelope::new(MessageType::Pong, "R1", SERVER_PEER_ID);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value, json!({"type": "pong", "room_id": "R1", "from": "server"}));
    }

    #[test]
    fn test_is_directed() {
        let env = Envelope::new(MessageType::Message, "R1", "a");
        assert!(!env.is_directed());
        assert!(env.with_to("b").is_directed());
    }
}
