//! Envelope dispatch.
//!
//! [`route`] runs inline on a connection's inbound pump, so envelopes from
//! one peer are handled strictly in arrival order. It never fails: bad
//! input is logged and discarded and the connection stays open.

use crate::connection::Connection;
use crate::hub::Hub;
use crate::stats::names;
use metrics::counter;
use roomcast_protocol::{codec, Envelope, MessageType, SERVER_PEER_ID};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Decode one inbound message from `connection` and act on it.
pub fn route(connection: &Arc<Connection>, hub: &Hub, data: &[u8]) {
    let mut envelope = match codec::decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                room = %connection.room_id(),
                peer = %connection.peer_id(),
                error = %e,
                "Discarding malformed envelope"
            );
            counter!(names::DECODE_ERRORS).increment(1);
            return;
        }
    };

    // The sender and room are always those of the connection, whatever
    // the client claimed.
    envelope.from = connection.peer_id().to_string();
    envelope.room_id = connection.room_id().to_string();

    trace!(
        room = %envelope.room_id,
        peer = %envelope.from,
        kind = %envelope.kind,
        "Routing envelope"
    );

    let kind = envelope.kind.clone();
    match kind {
        MessageType::Join => handle_join(connection, hub),
        MessageType::Leave => {
            debug!(room = %connection.room_id(), peer = %connection.peer_id(), "Leave requested");
            connection.cleanup();
        }
        _ if kind.is_relayed() => relay(hub, envelope),
        MessageType::Ping => {
            let pong = Envelope::new(MessageType::Pong, connection.room_id(), SERVER_PEER_ID);
            reply(connection, &pong);
        }
        _ => {
            debug!(
                room = %connection.room_id(),
                peer = %connection.peer_id(),
                kind = %kind,
                "Ignoring envelope"
            );
        }
    }
}

/// Acknowledge a join with the current membership, then announce the joiner.
fn handle_join(connection: &Arc<Connection>, hub: &Hub) {
    let room_id = connection.room_id();
    let peer_id = connection.peer_id();

    let ack = Envelope::new(MessageType::Join, room_id, SERVER_PEER_ID)
        .with_payload(json!({ "peers": hub.list_peers(room_id) }));
    reply(connection, &ack);

    let notify = Envelope::new(MessageType::PeerJoined, room_id, peer_id).with_payload(json!({}));
    if let Some(data) = encode(&notify) {
        hub.broadcast(room_id, data, Some(peer_id));
    }
}

/// Forward a negotiation or free-form envelope to one peer or the whole room.
fn relay(hub: &Hub, envelope: Envelope) {
    let Some(data) = encode(&envelope) else {
        return;
    };

    if envelope.is_directed() {
        hub.send_to(&envelope.room_id, &envelope.to, data);
    } else {
        hub.broadcast(&envelope.room_id, data, Some(&envelope.from));
    }
}

fn reply(connection: &Connection, envelope: &Envelope) {
    if let Some(data) = encode(envelope) {
        connection.enqueue(data);
    }
}

fn encode(envelope: &Envelope) -> Option<bytes::Bytes> {
    match codec::encode(envelope) {
        Ok(data) => Some(data),
        Err(e) => {
            error!(kind = %envelope.kind, error = %e, "Failed to encode envelope");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, Outbox};
    use serde_json::Value;

    struct Peer {
        conn: Arc<Connection>,
        outbox: Outbox,
    }

    impl Peer {
        fn join(hub: &Arc<Hub>, room: &str, peer: &str) -> Self {
            let (conn, outbox) = Connection::new(hub, room, peer, ConnectionConfig::default());
            hub.join(room, peer, Arc::clone(&conn));
            Self { conn, outbox }
        }

        fn send(&self, hub: &Hub, value: Value) {
            route(&self.conn, hub, value.to_string().as_bytes());
        }

        fn next(&mut self) -> Option<Envelope> {
            self.outbox
                .try_recv()
                .map(|data| codec::decode(&data).unwrap())
        }
    }

    #[test]
    fn test_join_ack_includes_joiner() {
        let hub = Arc::new(Hub::new());
        let mut a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");

        b.send(&hub, json!({"type": "join", "room_id": "R1"}));

        let ack = b.next().unwrap();
        assert_eq!(ack.kind, MessageType::Join);
        assert_eq!(ack.from, SERVER_PEER_ID);
        let mut peers: Vec<String> = serde_json::from_value(ack.payload["peers"].clone()).unwrap();
        peers.sort();
        assert_eq!(peers, vec!["A".to_string(), "B".to_string()]);
        assert!(b.next().is_none());

        let notify = a.next().unwrap();
        assert_eq!(notify.kind, MessageType::PeerJoined);
        assert_eq!(notify.from, "B");
        assert_eq!(notify.room_id, "R1");
        assert_eq!(notify.payload, json!({}));
    }

    #[test]
    fn test_offer_broadcast_excludes_sender() {
        let hub = Arc::new(Hub::new());
        let mut a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");

        a.send(&hub, json!({"type": "offer", "payload": {"sdp": "x"}}));

        let offer = b.next().unwrap();
        assert_eq!(offer.kind, MessageType::Offer);
        assert_eq!(offer.from, "A");
        assert_eq!(offer.room_id, "R1");
        assert_eq!(offer.payload, json!({"sdp": "x"}));
        assert!(a.next().is_none());
    }

    #[test]
    fn test_directed_send() {
        let hub = Arc::new(Hub::new());
        let mut a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");
        let mut c = Peer::join(&hub, "R1", "C");

        a.send(&hub, json!({"type": "answer", "to": "C", "answer": {"sdp": "y"}}));

        let answer = c.next().unwrap();
        assert_eq!(answer.to, "C");
        assert_eq!(answer.payload, json!({"sdp": "y"}));
        assert!(a.next().is_none());
        assert!(b.next().is_none());
    }

    #[test]
    fn test_directed_send_to_absent_peer_is_silent() {
        let hub = Arc::new(Hub::new());
        let mut a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");

        a.send(&hub, json!({"type": "candidate", "to": "ghost", "payload": {}}));

        assert!(a.next().is_none());
        assert!(b.next().is_none());
    }

    #[test]
    fn test_sender_spoofing_overwritten() {
        let hub = Arc::new(Hub::new());
        let a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");
        let mut other = Peer::join(&hub, "R2", "X");

        a.send(
            &hub,
            json!({"type": "message", "from": "mallory", "room_id": "R2", "payload": "hi"}),
        );

        let message = b.next().unwrap();
        assert_eq!(message.from, "A");
        assert_eq!(message.room_id, "R1");
        assert_eq!(message.payload, json!("hi"));
        assert!(other.next().is_none());
    }

    #[test]
    fn test_ping_replies_to_sender_only() {
        let hub = Arc::new(Hub::new());
        let mut a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");

        a.send(&hub, json!({"type": "ping"}));

        let pong = a.next().unwrap();
        assert_eq!(pong, Envelope::new(MessageType::Pong, "R1", SERVER_PEER_ID));
        assert!(b.next().is_none());
    }

    #[test]
    fn test_leave_cleans_up_connection() {
        let hub = Arc::new(Hub::new());
        let a = Peer::join(&hub, "R1", "A");

        a.send(&hub, json!({"type": "leave"}));

        assert!(a.conn.is_closed());
        assert!(!hub.room_exists("R1"));
    }

    #[test]
    fn test_ignored_and_malformed_envelopes() {
        let hub = Arc::new(Hub::new());
        let mut a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");

        a.send(&hub, json!({"type": "peer_joined"}));
        a.send(&hub, json!({"type": "renegotiate"}));
        route(&a.conn, &hub, b"{broken");
        route(&a.conn, &hub, br#"{"payload":{}}"#);

        assert!(!a.conn.is_closed());
        assert!(a.next().is_none());
        assert!(b.next().is_none());
    }

    #[test]
    fn test_both_room_spellings_still_relayed() {
        let hub = Arc::new(Hub::new());
        let a = Peer::join(&hub, "R1", "A");
        let mut b = Peer::join(&hub, "R1", "B");

        a.send(
            &hub,
            json!({"type": "candidate", "room_id": "R1", "roomId": "R1", "payload": {"c": 1}}),
        );

        let candidate = b.next().unwrap();
        assert_eq!(candidate.kind, MessageType::Candidate);
        assert_eq!(candidate.payload, json!({"c": 1}));
    }
}
