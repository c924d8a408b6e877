//! WebSocket backend
//!
//! Talks to a broker over a single WebSocket connection using the JSON
//! frames in [`super::message`]. Responsibilities:
//! - connect lazily on first use and authenticate with the configured password
//! - keep one local queue per subscribed backend topic and demultiplex
//!   incoming `message` frames into every queue whose patterns match
//! - detect a dead connection (failed write, closed stream) and report it as
//!   `ConnectionReset`; the next operation reconnects and re-issues every
//!   active pattern subscription
//!
//! The broker is expected to glob match published channels against the
//! patterns a connection subscribed to and to forward each message once per
//! connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use super::message::{ClientFrame, ServerFrame};
use super::pattern::{backend_patterns, matches_any};
use super::{Transport, TransportError};
use crate::config::ClientOptions;
use crate::envelope::MessageEnvelope;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Delivery = Result<MessageEnvelope, TransportError>;
type Subscriptions = Arc<Mutex<HashMap<String, WsSubscription>>>;

struct WsSubscription {
    patterns: Vec<String>,
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>>,
}

impl WsSubscription {
    fn new(topic: &str) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            patterns: backend_patterns(topic),
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }
}

struct Connection {
    sink: SplitSink<WsStream, WsMessage>,
    reader: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

pub struct WebSocketTransport {
    url: String,
    options: ClientOptions,
    connection: tokio::sync::Mutex<Option<Connection>>,
    subscriptions: Subscriptions,
    closed: AtomicBool,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

fn lock(subscriptions: &Subscriptions) -> MutexGuard<'_, HashMap<String, WsSubscription>> {
    subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
}

fn encode(frame: &ClientFrame) -> Result<WsMessage, TransportError> {
    serde_json::to_string(frame)
        .map(WsMessage::text)
        .map_err(|e| TransportError::Other(format!("unable to encode frame: {e}")))
}

impl WebSocketTransport {
    /// Creates the transport. No connection is made until the first
    /// operation needs one.
    pub fn new(url: impl Into<String>, options: ClientOptions) -> Self {
        Self {
            url: url.into(),
            options,
            connection: tokio::sync::Mutex::new(None),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    /// Returns the locked live connection, connecting first if there is
    /// none. The flag is true when the connection was just established, in
    /// which case every known pattern has already been re-subscribed.
    async fn connected(
        &self,
    ) -> Result<(tokio::sync::MutexGuard<'_, Option<Connection>>, bool), TransportError> {
        self.ensure_open()?;
        let mut guard = self.connection.lock().await;
        if guard.as_ref().is_some_and(Connection::is_alive) {
            return Ok((guard, false));
        }
        *guard = None;
        *guard = Some(self.connect().await?);
        Ok((guard, true))
    }

    async fn connect(&self) -> Result<Connection, TransportError> {
        let (stream, _response) =
            tokio::time::timeout(self.options.connect_timeout, connect_async(self.url.as_str()))
                .await
                .map_err(|_| {
                    TransportError::Io(format!(
                        "timed out connecting to {} after {:?}",
                        self.url, self.options.connect_timeout
                    ))
                })??;
        info!(url = %self.url, "connected to broker");

        let (mut sink, stream) = stream.split();

        if let Some(password) = &self.options.password {
            sink.send(encode(&ClientFrame::Auth {
                token: password.clone(),
            })?)
            .await?;
        }

        let patterns: Vec<String> = lock(&self.subscriptions)
            .values()
            .flat_map(|s| s.patterns.clone())
            .collect();
        for pattern in patterns {
            sink.send(encode(&ClientFrame::Subscribe { topic: pattern })?)
                .await?;
        }

        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_frames(
            stream,
            Arc::clone(&self.subscriptions),
            Arc::clone(&alive),
        ));

        Ok(Connection {
            sink,
            reader,
            alive,
        })
    }

    /// Writes `frames` on the live connection, dropping it on failure.
    async fn write(&self, frames: Vec<ClientFrame>) -> Result<(), TransportError> {
        let (mut guard, _) = self.connected().await?;
        let Some(connection) = guard.as_mut() else {
            return Err(TransportError::ConnectionReset("no connection".to_string()));
        };

        let mut outcome = Ok(());
        for frame in &frames {
            if let Err(e) = connection.sink.send(encode(frame)?).await {
                outcome = Err(e);
                break;
            }
        }

        if let Err(e) = outcome {
            warn!(url = %self.url, error = %e, "write failed, dropping connection");
            *guard = None;
            return Err(e.into());
        }
        Ok(())
    }

    /// Registers the local queue for `topic`. Returns the patterns when the
    /// subscription is new.
    fn register(&self, topic: &str) -> Option<Vec<String>> {
        let mut subscriptions = lock(&self.subscriptions);
        if subscriptions.contains_key(topic) {
            return None;
        }
        let subscription = WsSubscription::new(topic);
        let patterns = subscription.patterns.clone();
        subscriptions.insert(topic.to_string(), subscription);
        Some(patterns)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        let Some(patterns) = self.register(topic) else {
            return Ok(());
        };
        let (guard, fresh) = self.connected().await?;
        drop(guard);
        if !fresh {
            let frames = patterns
                .into_iter()
                .map(|topic| ClientFrame::Subscribe { topic })
                .collect();
            self.write(frames).await?;
        }
        debug!(topic, "websocket subscription created");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        let Some(subscription) = lock(&self.subscriptions).remove(topic) else {
            return Ok(());
        };
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let frames = subscription
            .patterns
            .into_iter()
            .map(|topic| ClientFrame::Unsubscribe { topic })
            .collect();
        self.write(frames).await
    }

    async fn send(&self, topic: &str, message: &MessageEnvelope) -> Result<(), TransportError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| TransportError::Other(format!("unable to encode envelope: {e}")))?;
        self.write(vec![ClientFrame::Publish {
            topic: topic.to_string(),
            payload,
            message_id: Some(Uuid::new_v4().to_string()),
            qos: Some(0),
        }])
        .await
    }

    async fn receive(&self, topic: &str) -> Result<MessageEnvelope, TransportError> {
        self.subscribe(topic).await?;
        let receiver = lock(&self.subscriptions)
            .get(topic)
            .map(|s| Arc::clone(&s.receiver))
            .ok_or(TransportError::Closed)?;

        // reconnect if the previous connection died
        let (guard, _) = self.connected().await?;
        drop(guard);

        let mut receiver = receiver.lock().await;
        receiver.recv().await.unwrap_or(Err(TransportError::Closed))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.subscriptions).clear();

        let connection = self.connection.lock().await.take();
        if let Some(mut connection) = connection {
            connection.alive.store(false, Ordering::SeqCst);
            connection.sink.close().await?;
            info!(url = %self.url, "disconnected from broker");
        }
        Ok(())
    }
}

/// Reads broker frames until the stream ends, fanning messages out to the
/// matching subscription queues.
async fn read_frames(
    mut stream: SplitStream<WsStream>,
    subscriptions: Subscriptions,
    alive: Arc<AtomicBool>,
) {
    let reason = loop {
        let text = match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => text,
            Some(Ok(WsMessage::Close(_))) | None => break "connection closed by broker".to_string(),
            Some(Ok(_)) => continue,
            Some(Err(e)) => break e.to_string(),
        };

        match serde_json::from_str::<ServerFrame>(text.as_str()) {
            Ok(ServerFrame::Message {
                topic,
                payload,
                timestamp,
                ..
            }) => {
                let delivery = serde_json::from_str::<MessageEnvelope>(&payload)
                    .map(|mut envelope| {
                        envelope.received_topic = topic.clone();
                        envelope
                    })
                    .map_err(|e| TransportError::Decode(e.to_string()));
                let lag_ms = chrono::Utc::now().timestamp_millis() - timestamp;
                debug!(%topic, lag_ms, "message frame received");

                for subscription in lock(&subscriptions).values() {
                    if matches_any(&subscription.patterns, &topic) {
                        let _ = subscription.sender.send(delivery.clone());
                    }
                }
            }
            Ok(ServerFrame::Error { message }) => {
                warn!(%message, "broker reported an error");
            }
            Ok(ServerFrame::Authenticated {}) => {
                debug!("authenticated with broker");
            }
            Err(e) => {
                warn!(error = %e, "ignoring unparseable frame");
            }
        }
    };

    alive.store(false, Ordering::SeqCst);
    warn!(%reason, "broker connection lost");
    for subscription in lock(&subscriptions).values() {
        let _ = subscription
            .sender
            .send(Err(TransportError::ConnectionReset(reason.clone())));
    }
}
