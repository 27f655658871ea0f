//! Shared fixtures for RoomCast benchmarks.

use roomcast_core::{Connection, ConnectionConfig, Hub, Outbox};
use std::sync::Arc;

/// A hub with `size` registered peers in `room`, named `peer-0..size`.
///
/// The returned outboxes must be kept alive (and drained) by the caller;
/// connections whose queues fill up start dropping.
#[must_use]
pub fn populated_hub(room: &str, size: usize) -> (Arc<Hub>, Vec<(Arc<Connection>, Outbox)>) {
    let hub = Arc::new(Hub::new());
    let peers = (0..size)
        .map(|i| {
            let peer = format!("peer-{}", i);
            let (conn, outbox) = Connection::new(&hub, room, &peer, ConnectionConfig::default());
            hub.join(room, &peer, Arc::clone(&conn));
            (conn, outbox)
        })
        .collect();
    (hub, peers)
}

/// Drain every outbox, returning how many messages were waiting.
pub fn drain(peers: &mut [(Arc<Connection>, Outbox)]) -> usize {
    let mut drained = 0;
    for (_, outbox) in peers.iter_mut() {
        while outbox.try_recv().is_some() {
            drained += 1;
        }
    }
    drained
}
