//! Room abstraction for RoomCast.
//!
//! A room is the set of peer connections that can exchange messages with
//! each other. Every access goes through the room's own lock; the lock is
//! never held across an await point.

use crate::connection::{Connection, ConnectionId, PeerId, RoomId};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// A signaling room.
#[derive(Debug)]
pub struct Room {
    /// Room name.
    id: RoomId,
    /// Connections indexed by peer id.
    peers: Mutex<HashMap<PeerId, Arc<Connection>>>,
}

impl Room {
    /// Create a new, empty room.
    #[must_use]
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            peers: Mutex::new(HashMap::new()),
        }
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, Arc<Connection>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the room name.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a connection under `peer_id`.
    ///
    /// A rejoining peer id silently replaces the previous connection,
    /// which is returned.
    pub fn add(
        &self,
        peer_id: impl Into<PeerId>,
        connection: Arc<Connection>,
    ) -> Option<Arc<Connection>> {
        let peer_id = peer_id.into();
        debug!(room = %self.id, peer = %peer_id, connection = %connection.id(), "Peer added");
        self.peers().insert(peer_id, connection)
    }

    /// Remove the connection registered under `peer_id`, if any.
    pub fn remove(&self, peer_id: &str) -> Option<Arc<Connection>> {
        let removed = self.peers().remove(peer_id);
        if removed.is_some() {
            debug!(room = %self.id, peer = %peer_id, "Peer removed");
        }
        removed
    }

    /// Remove `peer_id` only if it is still bound to `connection`.
    ///
    /// Returns `true` if the entry was removed.
    pub fn remove_connection(&self, peer_id: &str, connection: ConnectionId) -> bool {
        let mut peers = self.peers();
        match peers.get(peer_id) {
            Some(current) if current.id() == connection => {
                peers.remove(peer_id);
                debug!(room = %self.id, peer = %peer_id, "Peer removed");
                true
            }
            _ => false,
        }
    }

    /// Look up a connection by peer id.
    #[must_use]
    pub fn lookup(&self, peer_id: &str) -> Option<Arc<Connection>> {
        self.peers().get(peer_id).cloned()
    }

    /// Snapshot of the peer ids in the room, in no particular order.
    #[must_use]
    pub fn list_peers(&self) -> Vec<PeerId> {
        self.peers().keys().cloned().collect()
    }

    /// Enqueue `data` on every connection except `exclude`.
    ///
    /// Returns the number of connections that accepted the message.
    pub fn broadcast(&self, data: &Bytes, exclude: Option<&str>) -> usize {
        let peers = self.peers();
        let mut delivered = 0;
        for (peer_id, connection) in peers.iter() {
            if exclude == Some(peer_id.as_str()) {
                continue;
            }
            if connection.enqueue(data.clone()) {
                delivered += 1;
            }
        }
        trace!(room = %self.id, recipients = delivered, "Broadcast");
        delivered
    }

    /// Get the number of peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers().len()
    }

    /// Check if the room has no peers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers().is_empty()
    }
}
