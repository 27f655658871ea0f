//! In-memory transport.
//!
//! [`pair`] returns a [`MemoryTransport`] for the relay side and a
//! [`MemoryClient`] that plays the remote peer. Both directions are
//! unbounded channels, so sends never block.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::traits::{Inbound, Transport, TransportError, TransportSink, TransportStream};

/// A frame as seen by the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// Application data sent by the relay.
    Data(Bytes),
    /// A liveness probe sent by the relay.
    Ping,
    /// The relay closed the connection.
    Close,
}

/// Create a connected transport/client pair.
#[must_use]
pub fn pair() -> (MemoryTransport, MemoryClient) {
    let (to_relay, from_client) = mpsc::unbounded_channel();
    let (to_client, from_relay) = mpsc::unbounded_channel();

    let transport = MemoryTransport {
        sink: MemorySink {
            tx: to_client,
            closed: false,
        },
        stream: MemoryStream { rx: from_client },
    };
    let client = MemoryClient {
        tx: Some(to_relay),
        rx: from_relay,
    };
    (transport, client)
}

/// Relay side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    sink: MemorySink,
    stream: MemoryStream,
}

impl Transport for MemoryTransport {
    type Sink = MemorySink;
    type Stream = MemoryStream;

    fn split(self) -> (MemorySink, MemoryStream) {
        (self.sink, self.stream)
    }
}

/// Sending half of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemorySink {
    tx: mpsc::UnboundedSender<Delivered>,
    closed: bool,
}

impl MemorySink {
    fn deliver(&self, frame: Delivered) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.tx
            .send(frame)
            .map_err(|_| TransportError::SendFailed("client dropped".to_string()))
    }
}

#[async_trait]
impl TransportSink for MemorySink {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.deliver(Delivered::Data(data))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.deliver(Delivered::Ping)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        // The client may already be gone; closing is still successful.
        let _ = self.tx.send(Delivered::Close);
        self.closed = true;
        Ok(())
    }
}

/// Receiving half of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl TransportStream for MemoryStream {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

/// The remote peer of an in-memory connection.
#[derive(Debug)]
pub struct MemoryClient {
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    rx: mpsc::UnboundedReceiver<Delivered>,
}

impl MemoryClient {
    fn push(&self, inbound: Inbound) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx.send(inbound).map_err(|_| TransportError::ConnectionClosed),
            None => Err(TransportError::ConnectionClosed),
        }
    }

    /// Send an application message to the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay side is gone or the client closed.
    pub fn send(&self, data: impl Into<Bytes>) -> Result<(), TransportError> {
        self.push(Inbound::Data(data.into()))
    }

    /// Answer a liveness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay side is gone or the client closed.
    pub fn pong(&self) -> Result<(), TransportError> {
        self.push(Inbound::Pong(Bytes::new()))
    }

    /// Close the client's sending direction; the relay sees a clean close.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Wait for the next frame from the relay.
    ///
    /// Returns `None` once the relay side has been dropped.
    pub async fn recv(&mut self) -> Option<Delivered> {
        self.rx.recv().await
    }

    /// Take the next frame from the relay if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Delivered> {
        self.rx.try_recv().ok()
    }

    /// Take the next data frame, skipping pings.
    pub async fn recv_data(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await? {
                Delivered::Data(data) => return Some(data),
                Delivered::Ping => continue,
                Delivered::Close => return None,
            }
        }
    }
}
