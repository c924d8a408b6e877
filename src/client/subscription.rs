//! Subscriptions
//!
//! `subscribe` registers every requested topic atomically and then starts
//! one receive loop per topic. It returns only after every loop has issued
//! its backend subscribe, so a caller may publish something that triggers a
//! reply as soon as it returns.
//!
//! Each loop runs until its registry flag is disengaged:
//! 1. subscribe on the backend, signal readiness
//! 2. arm the registry change notification, check the flag, then wait for
//!    `receive` or the notification
//! 3. on every wake, check the flag first; if disengaged, unsubscribe on the
//!    backend, remove the registry entry and exit (a message received in the
//!    same wake is dropped)
//! 4. errors go to the caller's error channel, except an error equal to the
//!    previous one, which only costs a short sleep
//! 5. messages get their topic translated back and are delivered on the
//!    caller's channel; a slow consumer only slows its own topic

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{MessageClient, TopicChannel};
use crate::backend::{Transport, TransportError};
use crate::envelope::MessageEnvelope;
use crate::registry::SubscriptionRegistry;
use crate::topic::{from_backend, to_backend, validate_subscription_topic};
use crate::utils::{MessagingError, Result};

/// Pause before re-checking after an error identical to the previous one.
pub const REPEATED_ERROR_BACKOFF: Duration = Duration::from_millis(1);

impl MessageClient {
    /// Subscribes to every topic in `topics`, all or nothing.
    ///
    /// Messages are delivered on each topic's own channel; runtime errors
    /// from any of the loops are delivered on `errors`.
    pub async fn subscribe(
        &self,
        topics: Vec<TopicChannel>,
        errors: mpsc::Sender<MessagingError>,
    ) -> Result<()> {
        let transport = self.transport("unable to create a connection for subscribing")?;

        for topic in &topics {
            validate_subscription_topic(&topic.topic)?;
        }
        let names: Vec<&str> = topics.iter().map(|t| t.topic.as_str()).collect();
        self.registry.try_register_all(&names)?;

        let mut ready = Vec::with_capacity(topics.len());
        for topic in topics {
            let (ready_tx, ready_rx) = oneshot::channel();
            let receive_loop = ReceiveLoop {
                backend_topic: to_backend(&topic.topic),
                topic: topic.topic,
                messages: topic.messages,
                errors: errors.clone(),
                transport: Arc::clone(transport),
                registry: Arc::clone(&self.registry),
            };
            tokio::spawn(receive_loop.run(ready_tx));
            ready.push(ready_rx);
        }

        join_all(ready).await;
        Ok(())
    }
}

struct ReceiveLoop {
    topic: String,
    backend_topic: String,
    messages: mpsc::Sender<MessageEnvelope>,
    errors: mpsc::Sender<MessagingError>,
    transport: Arc<dyn Transport>,
    registry: Arc<SubscriptionRegistry>,
}

impl ReceiveLoop {
    async fn run(self, ready: oneshot::Sender<()>) {
        let subscribed = self.transport.subscribe(&self.backend_topic).await;
        let _ = ready.send(());
        debug!(topic = %self.topic, backend_topic = %self.backend_topic, "subscription loop started");

        // reported after readiness: the caller only drains errors once
        // subscribe has returned
        if let Err(err) = subscribed {
            self.report(err).await;
        }

        let mut previous: Option<TransportError> = None;
        loop {
            let notified = self.registry.changed();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.registry.is_engaged(&self.topic) {
                self.shutdown().await;
                return;
            }

            let received = tokio::select! {
                result = self.transport.receive(&self.backend_topic) => Some(result),
                _ = &mut notified => None,
            };

            // checked again so nothing is delivered after unsubscribe
            if !self.registry.is_engaged(&self.topic) {
                self.shutdown().await;
                return;
            }

            match received {
                None => continue,
                Some(Err(err)) => {
                    if previous.as_ref() == Some(&err) {
                        tokio::time::sleep(REPEATED_ERROR_BACKOFF).await;
                        continue;
                    }
                    previous = Some(err.clone());
                    self.report(err).await;
                }
                Some(Ok(mut message)) => {
                    previous = None;
                    message.received_topic = from_backend(&message.received_topic);
                    if self.messages.send(message).await.is_err() {
                        warn!(topic = %self.topic, "message channel closed, dropping message");
                    }
                }
            }
        }
    }

    async fn report(&self, err: TransportError) {
        warn!(topic = %self.topic, error = %err, "subscription receive failed");
        if self.errors.send(err.into()).await.is_err() {
            warn!(topic = %self.topic, "error channel closed, dropping error");
        }
    }

    async fn shutdown(&self) {
        // the entry stays until the backend side is gone so a concurrent
        // re-subscribe is rejected meanwhile
        if let Err(err) = self.transport.unsubscribe(&self.backend_topic).await {
            debug!(topic = %self.topic, error = %err, "backend unsubscribe failed");
        }
        self.registry.remove(&self.topic);
        debug!(topic = %self.topic, "subscription loop exited");
    }
}
