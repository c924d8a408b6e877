//! # TopicBus
//!
//! `topicbus` is an asynchronous publish/subscribe and request/response
//! messaging client. Callers address topics in a standard hierarchical
//! scheme (`a/b/#`, `a/+/c`); the client translates them to the scheme of a
//! pattern-subscribing backend and back again.
//!
//! ## Core Modules
//!
//! - `client`: `MessageClient`, with publish, subscribe, unsubscribe,
//!   request and disconnect, and one receive loop per subscribed topic.
//! - `registry`: the shared subscription registry (topic to "engaged" flag).
//! - `topic`: translation between the standard and the backend topic scheme.
//! - `envelope`: the `MessageEnvelope` wire format and its validation.
//! - `backend`: the `Transport` trait and its WebSocket and in-memory bindings.
//! - `config`: message bus configuration, client options and settings loading.
//! - `utils`: shared error type and logging setup.

pub mod backend;
pub mod client;
pub mod config;
pub mod envelope;
pub mod registry;
pub mod topic;
pub mod utils;

pub use client::{MessageClient, TopicChannel};
pub use envelope::MessageEnvelope;
pub use utils::{MessagingError, Result};
