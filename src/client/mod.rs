//! Message client
//!
//! `MessageClient` is the public face of the crate. It validates and
//! registers subscriptions, runs one receive loop per subscribed topic (see
//! [`subscription`]), translates topics to and from the backend scheme and
//! builds request/response exchanges on top of plain pub/sub (see
//! [`request`]).
//!
//! Clients are cheap to clone; clones share the transport and the
//! subscription registry.

pub mod request;
pub mod subscription;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::backend::{MemoryTransport, Transport, WebSocketTransport};
use crate::config::{BusType, ClientOptions, MessageBusConfig};
use crate::envelope::MessageEnvelope;
use crate::registry::SubscriptionRegistry;
use crate::topic::{to_backend, validate_publish_topic};
use crate::utils::{MessagingError, Result};

/// A topic to subscribe to and the channel its messages are delivered on.
#[derive(Debug, Clone)]
pub struct TopicChannel {
    pub topic: String,
    pub messages: mpsc::Sender<MessageEnvelope>,
}

impl TopicChannel {
    pub fn new(topic: impl Into<String>, messages: mpsc::Sender<MessageEnvelope>) -> Self {
        Self {
            topic: topic.into(),
            messages,
        }
    }
}

/// Builds the transport binding for `config.bus_type`.
pub fn create_transport(
    config: &MessageBusConfig,
    options: ClientOptions,
) -> Result<Arc<dyn Transport>> {
    match config.bus_type {
        BusType::WebSocket => Ok(Arc::new(WebSocketTransport::new(
            config.broker.url(),
            options,
        ))),
        BusType::Memory => Ok(Arc::new(MemoryTransport::new())),
    }
}

#[derive(Clone)]
pub struct MessageClient {
    transport: Option<Arc<dyn Transport>>,
    registry: Arc<SubscriptionRegistry>,
}

impl std::fmt::Debug for MessageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageClient")
            .field("connected", &self.transport.is_some())
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}

impl MessageClient {
    /// Creates a client for `config`.
    ///
    /// Invalid options fail here, before any I/O. Without broker host info
    /// the client is created without a transport and every operation that
    /// needs one fails with a configuration error.
    pub fn new(config: MessageBusConfig) -> Result<Self> {
        Self::with_creator(config, create_transport)
    }

    /// Same as [`MessageClient::new`] but the transport is built by
    /// `creator`, which is only invoked when broker host info is present.
    pub fn with_creator<F>(config: MessageBusConfig, creator: F) -> Result<Self>
    where
        F: FnOnce(&MessageBusConfig, ClientOptions) -> Result<Arc<dyn Transport>>,
    {
        let options = ClientOptions::from_config(&config)?;

        let transport = if config.broker.is_empty() {
            debug!("no broker configured, client created without a transport");
            None
        } else {
            Some(creator(&config, options)?)
        };

        Ok(Self {
            transport,
            registry: Arc::new(SubscriptionRegistry::new()),
        })
    }

    /// No-op: connections are established and pooled by the transport.
    pub async fn connect(&self) -> Result<()> {
        Ok(())
    }

    fn transport(&self, description: &str) -> Result<&Arc<dyn Transport>> {
        self.transport
            .as_ref()
            .ok_or_else(|| MessagingError::configuration("Broker", description))
    }

    /// Publishes `message` on `topic`.
    ///
    /// A send that fails because the connection was reset is retried once;
    /// the second attempt's result is returned as is.
    pub async fn publish(&self, message: &MessageEnvelope, topic: &str) -> Result<()> {
        let transport = self.transport("unable to create a connection for publishing")?;
        validate_publish_topic(topic)?;

        let backend_topic = to_backend(topic);
        match transport.send(&backend_topic, message).await {
            Err(err) if err.is_connection_reset() => {
                debug!(topic, error = %err, "send failed on a reset connection, retrying once");
                transport.send(&backend_topic, message).await?;
            }
            other => other?,
        }
        Ok(())
    }

    /// Stops the subscriptions for `topics`.
    ///
    /// Flags are flipped under the registry lock and the change notification
    /// wakes each loop, including one parked in `receive`. Nothing is
    /// published. Returns without waiting for the loops to exit; topics that
    /// are not subscribed are ignored.
    pub async fn unsubscribe<S: AsRef<str>>(&self, topics: &[S]) -> Result<()> {
        let disengaged = self.registry.disengage(topics);
        debug!(topics = ?disengaged, "subscriptions disengaged");
        Ok(())
    }

    /// Stops every subscription and closes the transport.
    pub async fn disconnect(&self) -> Result<()> {
        let mut causes = Vec::new();

        if let Some(transport) = &self.transport {
            let stopped = self.registry.disengage_all();
            debug!(subscriptions = stopped.len(), "stopping subscriptions");

            if let Err(err) = transport.close().await {
                causes.push(format!("unable to disconnect publish client: {err}"));
            }
        }

        if !causes.is_empty() {
            return Err(MessagingError::Disconnect { causes });
        }
        info!("message client disconnected");
        Ok(())
    }

    /// True while `topic` has a registry entry, including while its loop is
    /// shutting down.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.registry.contains(topic)
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }
}
