//! Message envelope
//!
//! `MessageEnvelope` is the unit every publish, subscription delivery and
//! request/response exchange carries. It is encoded as a JSON object with
//! fixed field names; `received_topic` is never encoded and is stamped by
//! the subscription layer when a message is delivered.

pub mod message;

pub use message::{
    API_VERSION, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT, EnvelopeError, MessageEnvelope,
};

#[cfg(test)]
mod tests;
