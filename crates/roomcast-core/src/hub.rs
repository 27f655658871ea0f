//! Room registry for RoomCast.
//!
//! The hub owns every live room. Rooms are created on first join and
//! removed the moment their last peer leaves.
//!
//! Locking is two-level: the registry (a sharded `DashMap`) guards room
//! existence and each [`Room`] guards its own membership. Locks are always
//! taken registry-first, and joins and empty-room removal both hold the
//! registry shard while touching the room, so a concurrent join can never
//! land in a room that is being deleted.

use crate::connection::{Connection, PeerId, RoomId};
use crate::room::Room;
use crate::stats::{names, HubStats};
use bytes::Bytes;
use dashmap::DashMap;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Registry of rooms.
///
/// A hub is explicit process state: construct one at startup and hand it
/// (behind an `Arc`) to every request path.
#[derive(Debug, Default)]
pub struct Hub {
    /// Rooms indexed by name.
    rooms: DashMap<RoomId, Arc<Room>>,
}

impl Hub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Register `connection` as `peer_id` in `room_id`, creating the room if needed.
    pub fn join(&self, room_id: &str, peer_id: &str, connection: Arc<Connection>) {
        let replaced = {
            let room = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
                debug!(room = %room_id, "Creating room");
                Arc::new(Room::new(room_id))
            });
            room.add(peer_id, connection)
        };

        if let Some(previous) = replaced {
            warn!(
                room = %room_id,
                peer = %peer_id,
                replaced = %previous.id(),
                "Peer id already present, replacing connection"
            );
        }
        info!(room = %room_id, peer = %peer_id, "Peer joined");
    }

    /// Remove `peer_id` from `room_id`, deleting the room if it becomes empty.
    pub fn leave(&self, room_id: &str, peer_id: &str) {
        let Some(room) = self.room(room_id) else {
            return;
        };
        if room.remove(peer_id).is_some() {
            info!(room = %room_id, peer = %peer_id, "Peer left");
        }
        self.remove_if_empty(room_id);
    }

    /// Remove `connection` from its room, unless its peer id has since been
    /// taken over by another connection.
    pub fn detach(&self, connection: &Connection) {
        let room_id = connection.room_id();
        let peer_id = connection.peer_id();
        let Some(room) = self.room(room_id) else {
            return;
        };
        if room.remove_connection(peer_id, connection.id()) {
            info!(room = %room_id, peer = %peer_id, "Peer left");
        } else {
            debug!(
                room = %room_id,
                peer = %peer_id,
                connection = %connection.id(),
                "Connection already replaced, leaving room entry in place"
            );
        }
        self.remove_if_empty(room_id);
    }

    fn remove_if_empty(&self, room_id: &str) {
        // `remove_if` holds the registry shard while the predicate takes the
        // room lock, so the check and the removal are atomic against joins.
        if self.rooms.remove_if(room_id, |_, room| room.is_empty()).is_some() {
            debug!(room = %room_id, "Deleted empty room");
        }
    }

    /// Enqueue `data` on every connection in `room_id` except `exclude`.
    ///
    /// Returns the number of connections that accepted the message; a
    /// missing room delivers to nobody.
    pub fn broadcast(&self, room_id: &str, data: Bytes, exclude: Option<&str>) -> usize {
        let Some(room) = self.room(room_id) else {
            trace!(room = %room_id, "Broadcast to non-existent room");
            return 0;
        };
        let delivered = room.broadcast(&data, exclude);
        counter!(names::MESSAGES_ROUTED, "kind" => "broadcast").increment(1);
        delivered
    }

    /// Enqueue `data` on the connection registered as `peer_id` in `room_id`.
    ///
    /// Returns `true` if the target accepted the message. A missing room
    /// or peer is a silent drop.
    pub fn send_to(&self, room_id: &str, peer_id: &str, data: Bytes) -> bool {
        // Release the room lock before enqueueing.
        let Some(target) = self.room(room_id).and_then(|room| room.lookup(peer_id)) else {
            trace!(room = %room_id, peer = %peer_id, "Directed send to absent peer");
            return false;
        };
        counter!(names::MESSAGES_ROUTED, "kind" => "direct").increment(1);
        target.enqueue(data)
    }

    /// Peer ids in `room_id`; empty if the room does not exist.
    #[must_use]
    pub fn list_peers(&self, room_id: &str) -> Vec<PeerId> {
        self.room(room_id)
            .map(|room| room.list_peers())
            .unwrap_or_default()
    }

    /// Check if a room exists.
    #[must_use]
    pub fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Number of peers in `room_id`.
    #[must_use]
    pub fn peer_count(&self, room_id: &str) -> usize {
        self.room(room_id).map(|room| room.len()).unwrap_or(0)
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            room_count: self.rooms.len(),
            peer_count: self.rooms.iter().map(|entry| entry.value().len()).sum(),
        }
    }

    /// Drop every room. Connections are not closed.
    pub fn clear(&self) {
        self.rooms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionConfig};

    fn connect(hub: &Arc<Hub>, room: &str, peer: &str) -> (Arc<Connection>, crate::Outbox) {
        let (conn, outbox) = Connection::new(hub, room, peer, ConnectionConfig::default());
        hub.join(room, peer, Arc::clone(&conn));
        (conn, outbox)
    }

    #[test]
    fn test_hub_join_leave() {
        let hub = Arc::new(Hub::new());
        let (_a, _oa) = connect(&hub, "R1", "A");
        assert!(hub.room_exists("R1"));
        assert_eq!(hub.peer_count("R1"), 1);

        hub.leave("R1", "A");
        // Room should be deleted eagerly
        assert!(!hub.room_exists("R1"));
        assert!(hub.list_peers("R1").is_empty());
    }

    #[test]
    fn test_hub_rejoin_creates_fresh_room() {
        let hub = Arc::new(Hub::new());
        let (_a, _oa) = connect(&hub, "R1", "A");
        let (_b, _ob) = connect(&hub, "R1", "B");
        hub.leave("R1", "A");
        hub.leave("R1", "B");
        assert!(!hub.room_exists("R1"));

        let (_c, _oc) = connect(&hub, "R1", "C");
        assert_eq!(hub.list_peers("R1"), vec!["C".to_string()]);
    }

    #[test]
    fn test_hub_leave_missing_is_noop() {
        let hub = Arc::new(Hub::new());
        hub.leave("nowhere", "A");

        let (_a, _oa) = connect(&hub, "R1", "A");
        hub.leave("R1", "ghost");
        assert_eq!(hub.peer_count("R1"), 1);
    }

    #[test]
    fn test_hub_broadcast() {
        let hub = Arc::new(Hub::new());
        let (_a, mut oa) = connect(&hub, "R1", "A");
        let (_b, mut ob) = connect(&hub, "R1", "B");
        let (_c, mut oc) = connect(&hub, "R2", "C");

        let count = hub.broadcast("R1", Bytes::from_static(b"hello"), Some("A"));
        assert_eq!(count, 1);
        assert!(oa.try_recv().is_none());
        assert_eq!(ob.try_recv().unwrap(), Bytes::from_static(b"hello"));
        // Other rooms are untouched
        assert!(oc.try_recv().is_none());

        assert_eq!(hub.broadcast("missing", Bytes::from_static(b"x"), None), 0);
    }

    #[test]
    fn test_hub_send_to() {
        let hub = Arc::new(Hub::new());
        let (_a, mut oa) = connect(&hub, "R1", "A");
        let (_b, mut ob) = connect(&hub, "R1", "B");

        assert!(hub.send_to("R1", "B", Bytes::from_static(b"direct")));
        assert_eq!(ob.try_recv().unwrap(), Bytes::from_static(b"direct"));
        assert!(oa.try_recv().is_none());

        // Routing misses are silent
        assert!(!hub.send_to("R1", "ghost", Bytes::from_static(b"x")));
        assert!(!hub.send_to("R9", "B", Bytes::from_static(b"x")));
        assert!(oa.try_recv().is_none());
        assert!(ob.try_recv().is_none());
    }

    #[test]
    fn test_hub_detach_respects_replacement() {
        let hub = Arc::new(Hub::new());
        let (first, _o1) = connect(&hub, "R1", "A");
        let (second, _o2) = connect(&hub, "R1", "A");

        hub.detach(&first);
        assert!(hub.room_exists("R1"));
        assert_eq!(hub.peer_count("R1"), 1);

        hub.detach(&second);
        assert!(!hub.room_exists("R1"));
    }

    #[test]
    fn test_hub_stats_and_clear() {
        let hub = Arc::new(Hub::new());
        let (_a, _oa) = connect(&hub, "R1", "A");
        let (_b, _ob) = connect(&hub, "R1", "B");
        let (_c, _oc) = connect(&hub, "R2", "C");

        assert_eq!(
            hub.stats(),
            HubStats {
                room_count: 2,
                peer_count: 3
            }
        );

        hub.clear();
        assert_eq!(hub.stats(), HubStats::default());
    }

    #[test]
    fn test_concurrent_join_leave_leaves_no_empty_rooms() {
        let hub = Arc::new(Hub::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let hub = Arc::clone(&hub);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let peer = format!("p{}-{}", t, i);
                        let (conn, _outbox) =
                            Connection::new(&hub, "shared", &peer, ConnectionConfig::default());
                        hub.join("shared", &peer, conn);
                        assert!(hub.room_exists("shared"));
                        hub.leave("shared", &peer);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!hub.room_exists("shared"));
        assert_eq!(hub.stats(), HubStats::default());
    }
}
