//! WebSocket transport implementation.
//!
//! This module adapts an upgraded axum [`WebSocket`] to the transport traits.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, trace};

use crate::traits::{Inbound, Transport, TransportError, TransportSink, TransportStream};

/// An upgraded WebSocket session.
pub struct WebSocketTransport {
    socket: WebSocket,
}

impl WebSocketTransport {
    /// Wrap an upgraded WebSocket.
    #[must_use]
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

impl Transport for WebSocketTransport {
    type Sink = WebSocketSink;
    type Stream = WebSocketStream;

    fn split(self) -> (WebSocketSink, WebSocketStream) {
        let (sink, stream) = self.socket.split();
        (
            WebSocketSink {
                inner: sink,
                closed: false,
            },
            WebSocketStream { inner: stream },
        )
    }
}

/// Sending half of a WebSocket session.
pub struct WebSocketSink {
    inner: SplitSink<WebSocket, Message>,
    closed: bool,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }

        // Envelopes are JSON, so they go out as text frames.
        let message = match std::str::from_utf8(&data) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_) => Message::Binary(data.to_vec()),
        };
        self.inner
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }

        self.inner
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(()); // Already closed
        }
        self.closed = true;

        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Other(format!("Failed to close: {}", e)))
    }
}

/// Receiving half of a WebSocket session.
pub struct WebSocketStream {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl TransportStream for WebSocketStream {
    async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
        match self.inner.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(Inbound::Data(Bytes::from(text)))),
            Some(Ok(Message::Binary(data))) => Ok(Some(Inbound::Data(Bytes::from(data)))),
            Some(Ok(Message::Ping(data))) => {
                // axum queues the pong reply itself.
                trace!("Received ping");
                Ok(Some(Inbound::Ping(Bytes::from(data))))
            }
            Some(Ok(Message::Pong(data))) => Ok(Some(Inbound::Pong(Bytes::from(data)))),
            Some(Ok(Message::Close(_))) => {
                debug!("Received close frame");
                Ok(None)
            }
            Some(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
            None => {
                debug!("WebSocket stream ended");
                Ok(None)
            }
        }
    }
}
