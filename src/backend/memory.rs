//! In-process backend
//!
//! A `MemoryTransport` is one subscriber attached to an in-process hub.
//! `send` copies the message into every queue, of every transport on the
//! hub, whose patterns match the channel. [`MemoryTransport::peer`] attaches
//! another transport to the same hub, so clients built on peers talk to
//! each other as they would through a broker: each gets its own copy, and
//! one client's unsubscribe or close never touches another's queues.
//!
//! Hooks used to drive failure paths in tests:
//! - `inject_receive_error`: queue an error for the next `receive`
//! - `fail_next_sends`: make the next sends fail
//! - `record_sends` / `published`: opt-in log of successful sends
//! - `patterns`, `subscription_count`: inspect this transport's subscriptions

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::pattern::{backend_patterns, matches_any};
use super::{Transport, TransportError};
use crate::envelope::MessageEnvelope;

type Delivery = Result<MessageEnvelope, TransportError>;
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>;

/// Subscriptions are keyed by owning transport and backend topic.
type SubscriptionKey = (u64, String);

#[derive(Debug)]
struct MemorySubscription {
    patterns: Vec<String>,
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: SharedReceiver,
}

impl MemorySubscription {
    fn new(topic: &str) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            patterns: backend_patterns(topic),
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }
}

#[derive(Debug, Default)]
struct Hub {
    subscriptions: Mutex<HashMap<SubscriptionKey, MemorySubscription>>,
    next_subscriber: AtomicU64,
}

impl Hub {
    fn subscriptions(&self) -> MutexGuard<'_, HashMap<SubscriptionKey, MemorySubscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct LocalState {
    failing_sends: VecDeque<TransportError>,
    published: Option<Vec<(String, MessageEnvelope)>>,
    closed: bool,
}

#[derive(Debug)]
pub struct MemoryTransport {
    hub: Arc<Hub>,
    id: u64,
    local: Mutex<LocalState>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::attach(Arc::new(Hub::default()))
    }
}

impl MemoryTransport {
    /// Creates a transport on a hub of its own.
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(hub: Arc<Hub>) -> Self {
        let id = hub.next_subscriber.fetch_add(1, Ordering::Relaxed);
        Self {
            hub,
            id,
            local: Mutex::new(LocalState::default()),
        }
    }

    /// Creates another subscriber on the same hub.
    pub fn peer(&self) -> Self {
        Self::attach(Arc::clone(&self.hub))
    }

    fn local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self, topic: &str) -> SubscriptionKey {
        (self.id, topic.to_string())
    }

    /// Queues `error` as the next result of `receive(topic)`, creating the
    /// subscription if it does not exist yet.
    pub fn inject_receive_error(&self, topic: &str, error: TransportError) {
        let mut subscriptions = self.hub.subscriptions();
        let subscription = subscriptions
            .entry(self.key(topic))
            .or_insert_with(|| MemorySubscription::new(topic));
        let _ = subscription.sender.send(Err(error));
    }

    /// Makes the next sends fail with `errors`, in order.
    pub fn fail_next_sends(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.local().failing_sends.extend(errors);
    }

    /// Starts recording every successful send from this transport.
    pub fn record_sends(&self) {
        self.local().published.get_or_insert_with(Vec::new);
    }

    /// Recorded `(channel, message)` pairs, oldest first. Empty unless
    /// [`MemoryTransport::record_sends`] was called.
    pub fn published(&self) -> Vec<(String, MessageEnvelope)> {
        self.local().published.clone().unwrap_or_default()
    }

    /// Patterns backing this transport's subscription for `topic`.
    pub fn patterns(&self, topic: &str) -> Option<Vec<String>> {
        self.hub
            .subscriptions()
            .get(&self.key(topic))
            .map(|s| s.patterns.clone())
    }

    pub fn subscription_count(&self) -> usize {
        self.hub
            .subscriptions()
            .keys()
            .filter(|(owner, _)| *owner == self.id)
            .count()
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.local().closed {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn receiver_for(&self, topic: &str) -> Result<SharedReceiver, TransportError> {
        self.ensure_open()?;
        let mut subscriptions = self.hub.subscriptions();
        let subscription = subscriptions
            .entry(self.key(topic))
            .or_insert_with(|| MemorySubscription::new(topic));
        Ok(Arc::clone(&subscription.receiver))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.receiver_for(topic)?;
        debug!(topic, subscriber = self.id, "memory subscription created");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        // dropping the sender wakes this transport's parked receive with `Closed`
        self.hub.subscriptions().remove(&self.key(topic));
        debug!(topic, subscriber = self.id, "memory subscription removed");
        Ok(())
    }

    async fn send(&self, topic: &str, message: &MessageEnvelope) -> Result<(), TransportError> {
        {
            let mut local = self.local();
            if let Some(err) = local.failing_sends.pop_front() {
                return Err(err);
            }
            if local.closed {
                return Err(TransportError::Closed);
            }
        }

        let mut delivered = message.clone();
        delivered.received_topic = topic.to_string();
        for subscription in self.hub.subscriptions().values() {
            if matches_any(&subscription.patterns, topic) {
                let _ = subscription.sender.send(Ok(delivered.clone()));
            }
        }

        if let Some(published) = self.local().published.as_mut() {
            published.push((topic.to_string(), message.clone()));
        }
        Ok(())
    }

    async fn receive(&self, topic: &str) -> Result<MessageEnvelope, TransportError> {
        let receiver = self.receiver_for(topic)?;
        let mut receiver = receiver.lock().await;
        receiver.recv().await.unwrap_or(Err(TransportError::Closed))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.local().closed = true;
        self.hub
            .subscriptions()
            .retain(|(owner, _), _| *owner != self.id);
        Ok(())
    }
}
