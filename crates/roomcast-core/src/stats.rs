//! Hub statistics and metric names.
//!
//! The core records counters through the `metrics` facade; the server
//! decides whether and where they are exported.

/// Metric names recorded by the core.
pub mod names {
    pub const MESSAGES_ROUTED: &str = "roomcast_messages_routed_total";
    pub const MESSAGES_DROPPED: &str = "roomcast_messages_dropped_total";
    pub const DECODE_ERRORS: &str = "roomcast_decode_errors_total";
    pub const HEARTBEAT_TIMEOUTS: &str = "roomcast_heartbeat_timeouts_total";
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Number of live rooms.
    pub room_count: usize,
    /// Number of registered peers across all rooms.
    pub peer_count: usize,
}
