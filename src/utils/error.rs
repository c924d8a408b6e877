//! The `error` module defines the error taxonomy of `topicbus`.
//!
//! Construction and validation failures are returned synchronously to the
//! caller. Failures observed inside a running subscription are delivered on
//! the caller's error channel as the same [`MessagingError`] type.

use std::time::Duration;

use thiserror::Error;

use crate::backend::TransportError;
use crate::envelope::EnvelopeError;

/// Result type alias for message client operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors reported by the message client.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Missing or invalid broker/option configuration, raised before any I/O.
    #[error("missing or invalid configuration '{name}': {description}")]
    Configuration { name: String, description: String },

    /// Empty or malformed topic.
    #[error("invalid topic '{topic}': {description}")]
    InvalidTopic { topic: String, description: String },

    /// The topic already has a registry entry.
    #[error("subscription for '{topic}' topic already exists, must be unique")]
    DuplicateSubscription { topic: String },

    /// Opaque failure passed through from the backend transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A request/response exchange did not complete in time.
    #[error(
        "timed out after {elapsed:?} waiting for response on '{response_topic}' to request sent to '{request_topic}'"
    )]
    RequestTimeout {
        request_topic: String,
        response_topic: String,
        elapsed: Duration,
    },

    /// One or more underlying clients failed to close.
    #[error("unable to disconnect client(s): {}", .causes.join(","))]
    Disconnect { causes: Vec<String> },

    /// The envelope failed validation.
    #[error("invalid message envelope: {0}")]
    Envelope(#[from] EnvelopeError),
}

impl MessagingError {
    pub fn configuration(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Configuration {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn invalid_topic(topic: impl Into<String>, description: impl Into<String>) -> Self {
        Self::InvalidTopic {
            topic: topic.into(),
            description: description.into(),
        }
    }

    pub fn duplicate_subscription(topic: impl Into<String>) -> Self {
        Self::DuplicateSubscription {
            topic: topic.into(),
        }
    }
}
