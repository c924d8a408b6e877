use serde::{Deserialize, Serialize};

/// Frames the client sends to a WebSocket broker.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "auth")]
    Auth { token: String },
    #[serde(rename = "subscribe")]
    Subscribe { topic: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topic: String },
    /// `payload` is the JSON encoded envelope.
    #[serde(rename = "publish")]
    Publish {
        topic: String,
        payload: String,
        message_id: Option<String>,
        qos: Option<u8>,
    },
}

/// Frames a WebSocket broker sends to the client.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "authenticated")]
    Authenticated {},
    #[serde(rename = "error")]
    Error { message: String },
    /// `topic` is the channel the message was published on.
    #[serde(rename = "message")]
    Message {
        topic: String,
        payload: String,
        timestamp: i64,
        #[serde(default)]
        message_id: String,
        #[serde(default)]
        qos: u8,
    },
}
