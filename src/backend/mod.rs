//! The `backend` module defines the contract between the message client and
//! the pub/sub engine underneath it, plus the bindings shipped with the
//! crate.
//!
//! Backend topics use the backend scheme (`.` separator, `*` wildcard); the
//! client translates before calling in. A subscription is pattern based:
//! `receive` on a subscribed topic yields every message whose channel
//! matches one of the subscription's patterns (see [`pattern`]).
//!
//! - `memory`: in-process binding, also the test double for the client.
//! - `websocket`: binding to a broker speaking the JSON frames in [`message`].

pub mod memory;
pub mod message;
pub mod pattern;
pub mod websocket;

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::MessageEnvelope;

pub use memory::MemoryTransport;
pub use websocket::WebSocketTransport;

/// Errors raised by a backend transport.
///
/// Equality is meaningful: the receive loop compares consecutive errors to
/// throttle repeats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection was reset or hit EOF. Publishing retries this once.
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("transport is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("unable to decode message: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_connection_reset(&self) -> bool {
        matches!(self, TransportError::ConnectionReset(_))
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        use std::io::ErrorKind;
        use tungstenite::error::ProtocolError;

        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::ConnectionReset(err.to_string())
            }
            tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                TransportError::ConnectionReset(err.to_string())
            }
            tungstenite::Error::Io(e) => match e.kind() {
                ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof => TransportError::ConnectionReset(e.to_string()),
                _ => TransportError::Io(e.to_string()),
            },
            other => TransportError::Other(other.to_string()),
        }
    }
}

/// Pattern based pub/sub engine the message client runs on.
///
/// Implementations must be safe to call concurrently from every
/// subscription loop and the publish path, and `receive` must be cancel
/// safe: dropping its future before completion must not lose a message.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts the pattern subscription for `topic`.
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Ends the subscription for `topic`. Unknown topics are ignored.
    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Publishes `message` on the channel `topic`.
    async fn send(&self, topic: &str, message: &MessageEnvelope) -> Result<(), TransportError>;

    /// Waits for the next message matching the subscription for `topic`,
    /// subscribing first if needed. `received_topic` on the result holds
    /// the backend channel the message was published on.
    async fn receive(&self, topic: &str) -> Result<MessageEnvelope, TransportError>;

    /// Releases every subscription and the underlying connection.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests;
