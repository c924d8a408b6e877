//! Request/response over pub/sub
//!
//! A request subscribes to a response topic unique to the request, publishes
//! the request, then waits for the first of: a response, an error from the
//! response subscription, or the deadline. The response subscription is
//! released on every path before returning.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{MessageClient, TopicChannel};
use crate::envelope::MessageEnvelope;
use crate::topic::build_topic;
use crate::utils::{MessagingError, Result};

impl MessageClient {
    /// Sends `message` to `request_topic` and waits up to `timeout` for the
    /// reply on `response_topic_prefix/<correlation id>`.
    ///
    /// The request's correlation ID names the response topic; its request ID
    /// is used when no correlation ID is set.
    pub async fn request(
        &self,
        message: &MessageEnvelope,
        request_topic: &str,
        response_topic_prefix: &str,
        timeout: Duration,
    ) -> Result<MessageEnvelope> {
        let started = Instant::now();

        let id = if message.correlation_id.is_empty() {
            message.request_id.as_str()
        } else {
            message.correlation_id.as_str()
        };
        if id.is_empty() {
            return Err(MessagingError::invalid_topic(
                response_topic_prefix,
                "request carries neither a correlation ID nor a request ID",
            ));
        }
        let response_topic = build_topic(&[response_topic_prefix, id]);

        let (messages_tx, mut messages_rx) = mpsc::channel(1);
        let (errors_tx, mut errors_rx) = mpsc::channel(1);
        if let Err(err) = self
            .subscribe(vec![TopicChannel::new(&response_topic, messages_tx)], errors_tx)
            .await
        {
            warn!(%response_topic, error = %err, "unable to subscribe to response topic");
            return Err(err);
        }

        let outcome = match self.publish(message, request_topic).await {
            Err(err) => Err(err),
            Ok(()) => {
                debug!(request_topic, %response_topic, "request published");
                tokio::select! {
                    Some(response) = messages_rx.recv() => Ok(response),
                    Some(err) = errors_rx.recv() => Err(err),
                    _ = tokio::time::sleep_until(started + timeout) => {
                        Err(MessagingError::RequestTimeout {
                            request_topic: request_topic.to_string(),
                            response_topic: response_topic.clone(),
                            elapsed: started.elapsed(),
                        })
                    }
                }
            }
        };

        if let Err(err) = self.unsubscribe(&[response_topic.as_str()]).await {
            warn!(%response_topic, error = %err, "unable to release response subscription");
        }
        outcome
    }
}
