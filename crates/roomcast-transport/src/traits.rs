//! Transport abstraction traits for RoomCast.
//!
//! These traits define the interface every duplex message channel must
//! provide, allowing the relay core to stay transport-agnostic.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation did not complete before its deadline.
    #[error("Connection timed out")]
    Timeout,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// A message received from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Application data (a text or binary message).
    Data(Bytes),
    /// Transport-level liveness probe from the peer.
    Ping(Bytes),
    /// Reply to one of our liveness probes.
    Pong(Bytes),
}

/// The receiving half of a transport.
#[async_trait]
pub trait TransportStream: Send {
    /// Receive the next message.
    ///
    /// Returns `None` if the peer closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError>;
}

/// The sending half of a transport.
#[async_trait]
pub trait TransportSink: Send {
    /// Send one application message.
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError>;

    /// Send a transport-level liveness probe.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// An established duplex message channel to a single peer.
pub trait Transport: Send + 'static {
    /// Sending half.
    type Sink: TransportSink + 'static;
    /// Receiving half.
    type Stream: TransportStream + 'static;

    /// Split the transport so each half can be driven by its own task.
    fn split(self) -> (Self::Sink, Self::Stream);
}
