//! Peer connections.
//!
//! A [`Connection`] owns one peer's duplex session. Two tasks drive it:
//!
//! - the **inbound pump** reads one message at a time, hands it to the
//!   router, and gives up if nothing (data or heartbeat) arrives within
//!   the pong timeout;
//! - the **outbound pump** writes queued messages in order and pings the
//!   peer on a fixed interval.
//!
//! The pumps share nothing but the bounded outbound queue and a one-shot
//! shutdown signal. Whichever side fails first runs [`Connection::cleanup`];
//! later calls are no-ops.

use crate::hub::Hub;
use crate::router;
use crate::stats::names;
use bytes::Bytes;
use metrics::counter;
use roomcast_transport::{Inbound, Transport, TransportError, TransportSink, TransportStream};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// A room identifier.
pub type RoomId = String;

/// A peer identifier, unique only within its room.
pub type PeerId = String;

/// Default outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Counter for process-unique connection ids.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// Floor applied to the ping interval.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(10);

/// Connection timing and queueing configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Outbound queue capacity; messages beyond it are dropped.
    pub queue_capacity: usize,
    /// How long the inbound pump waits for data or a pong.
    pub pong_timeout: Duration,
    /// Deadline for a single write.
    pub write_timeout: Duration,
    /// Interval between liveness pings.
    pub ping_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pong_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(25),
        }
    }
}

/// Hook run once when a connection is cleaned up.
pub type CloseHook = Box<dyn FnOnce() + Send + 'static>;

/// Consumer side of a connection's outbound queue.
///
/// Owned by the outbound pump once the connection is started.
#[derive(Debug)]
pub struct Outbox {
    rx: mpsc::Receiver<Bytes>,
}

impl Outbox {
    /// Take the oldest queued message, if any.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next queued message.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// One live peer session in one room.
pub struct Connection {
    id: ConnectionId,
    room_id: RoomId,
    peer_id: PeerId,
    /// Producer side of the outbound queue.
    outbound: mpsc::Sender<Bytes>,
    /// One-shot termination signal observed by both pumps.
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    dropped: AtomicU64,
    /// Non-owning, used only to deregister on cleanup.
    hub: Weak<Hub>,
    on_close: Mutex<Option<CloseHook>>,
    config: ConnectionConfig,
}

impl Connection {
    /// Create a connection and its outbound queue.
    ///
    /// The connection is neither registered nor started; see [`accept`].
    #[must_use]
    pub fn new(
        hub: &Arc<Hub>,
        room_id: impl Into<RoomId>,
        peer_id: impl Into<PeerId>,
        config: ConnectionConfig,
    ) -> (Arc<Self>, Outbox) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, _) = watch::channel(false);

        let connection = Arc::new(Self {
            id: ConnectionId::next(),
            room_id: room_id.into(),
            peer_id: peer_id.into(),
            outbound: tx,
            shutdown,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            hub: Arc::downgrade(hub),
            on_close: Mutex::new(None),
            config,
        });
        (connection, Outbox { rx })
    }

    /// Get the connection id.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the room this connection belongs to.
    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Get the peer id of this connection.
    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Number of messages dropped because the outbound queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Check if cleanup has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Install a hook that runs once when the connection is cleaned up.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_close.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    /// Try to append `data` to the outbound queue without blocking.
    ///
    /// Returns `false` if the message was dropped, either because the queue
    /// is full or because the connection is shutting down.
    pub fn enqueue(&self, data: Bytes) -> bool {
        match self.outbound.try_send(data) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                counter!(names::MESSAGES_DROPPED).increment(1);
                warn!(
                    room = %self.room_id,
                    peer = %self.peer_id,
                    dropped,
                    "Outbound queue full, dropping message"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!(room = %self.room_id, peer = %self.peer_id, "Enqueue on closed connection");
                false
            }
        }
    }

    /// Tear the connection down.
    ///
    /// Signals both pumps, deregisters from the hub and runs the close
    /// hook. Only the first call has any effect; the outbound pump closes
    /// the transport on its way out.
    pub fn cleanup(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown.send_replace(true);

        if let Some(hub) = self.hub.upgrade() {
            hub.detach(self);
        }

        let hook = self
            .on_close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }

        debug!(
            room = %self.room_id,
            peer = %self.peer_id,
            connection = %self.id,
            "Connection cleaned up"
        );
    }

    /// Start the inbound and outbound pumps on the current tokio runtime.
    pub fn start<T: Transport>(self: &Arc<Self>, outbox: Outbox, transport: T) {
        let (sink, stream) = transport.split();
        tokio::spawn(Arc::clone(self).write_pump(outbox, sink));
        tokio::spawn(Arc::clone(self).read_pump(stream));
    }

    async fn read_pump<S: TransportStream>(self: Arc<Self>, mut stream: S) {
        let mut shutdown = self.shutdown.subscribe();

        while !self.is_closed() {
            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = timeout(self.config.pong_timeout, stream.recv()) => next,
            };

            match next {
                Ok(Ok(Some(Inbound::Data(data)))) => match self.hub.upgrade() {
                    Some(hub) => router::route(&self, &hub, &data),
                    None => break,
                },
                Ok(Ok(Some(Inbound::Ping(_) | Inbound::Pong(_)))) => {
                    trace!(peer = %self.peer_id, "Heartbeat");
                }
                Ok(Ok(None)) => {
                    debug!(room = %self.room_id, peer = %self.peer_id, "Peer closed connection");
                    break;
                }
                Ok(Err(e)) => {
                    debug!(room = %self.room_id, peer = %self.peer_id, error = %e, "Read failed");
                    break;
                }
                Err(_) => {
                    warn!(room = %self.room_id, peer = %self.peer_id, "Heartbeat timeout");
                    counter!(names::HEARTBEAT_TIMEOUTS).increment(1);
                    break;
                }
            }
        }

        self.cleanup();
    }

    async fn write_pump<K: TransportSink>(self: Arc<Self>, mut outbox: Outbox, mut sink: K) {
        let mut shutdown = self.shutdown.subscribe();
        // A zero period would panic the ticker.
        let period = self.config.ping_interval.max(MIN_PING_INTERVAL);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.is_closed() {
            let result = tokio::select! {
                _ = shutdown.changed() => break,
                next = outbox.recv() => match next {
                    Some(data) => self.write(sink.send(data)).await,
                    None => break,
                },
                _ = ticker.tick() => self.write(sink.ping()).await,
            };

            if let Err(e) = result {
                debug!(room = %self.room_id, peer = %self.peer_id, error = %e, "Write failed");
                break;
            }
        }

        self.cleanup();
        if let Err(e) = sink.close().await {
            trace!(peer = %self.peer_id, error = %e, "Close failed");
        }
    }

    async fn write<F>(&self, op: F) -> Result<(), TransportError>
    where
        F: std::future::Future<Output = Result<(), TransportError>>,
    {
        match timeout(self.config.write_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("room_id", &self.room_id)
            .field("peer_id", &self.peer_id)
            .field("closed", &self.is_closed())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Register a new connection for `peer_id` in `room_id` and start its pumps.
///
/// `on_close` runs exactly once, when the connection is cleaned up.
pub fn accept<T: Transport>(
    hub: &Arc<Hub>,
    room_id: &str,
    peer_id: &str,
    transport: T,
    config: ConnectionConfig,
    on_close: Option<CloseHook>,
) -> Arc<Connection> {
    let (connection, outbox) = Connection::new(hub, room_id, peer_id, config);
    if let Some(hook) = on_close {
        connection.on_close(hook);
    }
    hub.join(room_id, peer_id, Arc::clone(&connection));
    connection.start(outbox, transport);
    connection
}
