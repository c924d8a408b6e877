use std::time::Duration;

use super::memory::MemoryTransport;
use super::message::{ClientFrame, ServerFrame};
use super::pattern::{backend_patterns, matches};
use super::{Transport, TransportError};
use crate::envelope::MessageEnvelope;

#[test]
fn test_backend_patterns_trailing_wildcard() {
    assert_eq!(backend_patterns("a.b.*"), vec!["a.b.*", "a.b"]);
}

#[test]
fn test_backend_patterns_plain_topic() {
    assert_eq!(backend_patterns("a.b"), vec!["a.b"]);
    assert_eq!(backend_patterns("a.*.c"), vec!["a.*.c"]);
    assert_eq!(backend_patterns("*"), vec!["*"]);
}

#[test]
fn test_glob_matching() {
    assert!(matches("a.b", "a.b"));
    assert!(!matches("a.b", "a.b.c"));
    assert!(matches("a.b.*", "a.b.c"));
    assert!(matches("a.b.*", "a.b.c.d"));
    assert!(!matches("a.b.*", "a.b"));
    assert!(matches("a.*.c", "a.x.c"));
    assert!(!matches("a.*.c", "a.x.d"));
    assert!(matches("*", "anything.at.all"));
    assert!(matches("*.status", "device.status"));
    assert!(!matches("", "a"));
    assert!(matches("", ""));
}

#[test]
fn test_connection_reset_classification() {
    assert!(TransportError::ConnectionReset("EOF".to_string()).is_connection_reset());
    assert!(!TransportError::Closed.is_connection_reset());

    let err: TransportError = tungstenite::Error::ConnectionClosed.into();
    assert!(err.is_connection_reset());

    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
    let err: TransportError = tungstenite::Error::Io(io).into();
    assert!(err.is_connection_reset());

    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: TransportError = tungstenite::Error::Io(io).into();
    assert!(matches!(err, TransportError::Io(_)));
}

#[test]
fn test_frame_wire_format() {
    let frame = ClientFrame::Subscribe {
        topic: "a.b.*".to_string(),
    };
    let json: serde_json::Value = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["type"], "subscribe");
    assert_eq!(json["topic"], "a.b.*");

    let text = r#"{"type":"message","topic":"a.b","payload":"{}","timestamp":0}"#;
    let frame: ServerFrame = serde_json::from_str(text).unwrap();
    assert!(matches!(frame, ServerFrame::Message { ref topic, .. } if topic == "a.b"));
}

async fn recv(transport: &MemoryTransport, topic: &str) -> MessageEnvelope {
    tokio::time::timeout(Duration::from_secs(1), transport.receive(topic))
        .await
        .expect("receive timed out")
        .expect("receive failed")
}

#[tokio::test]
async fn test_memory_subscription_uses_two_patterns_for_trailing_wildcard() {
    let transport = MemoryTransport::new();
    transport.subscribe("a.b.*").await.unwrap();
    assert_eq!(
        transport.patterns("a.b.*"),
        Some(vec!["a.b.*".to_string(), "a.b".to_string()])
    );

    transport
        .send("a.b", &MessageEnvelope::new("zero levels"))
        .await
        .unwrap();
    transport
        .send("a.b.c", &MessageEnvelope::new("one level"))
        .await
        .unwrap();

    let first = recv(&transport, "a.b.*").await;
    assert_eq!(first.payload, b"zero levels");
    assert_eq!(first.received_topic, "a.b");

    let second = recv(&transport, "a.b.*").await;
    assert_eq!(second.payload, b"one level");
    assert_eq!(second.received_topic, "a.b.c");
}

#[tokio::test]
async fn test_memory_send_to_unmatched_channel_is_dropped() {
    let transport = MemoryTransport::new();
    transport.record_sends();
    transport.subscribe("x.y").await.unwrap();
    transport
        .send("x.z", &MessageEnvelope::new("nobody"))
        .await
        .unwrap();

    let pending = tokio::time::timeout(Duration::from_millis(50), transport.receive("x.y")).await;
    assert!(pending.is_err());
    assert_eq!(transport.published().len(), 1);
}

#[tokio::test]
async fn test_memory_sends_are_not_recorded_by_default() {
    let transport = MemoryTransport::new();
    for _ in 0..100 {
        transport
            .send("t", &MessageEnvelope::default())
            .await
            .unwrap();
    }
    assert!(transport.published().is_empty());
}

#[tokio::test]
async fn test_memory_peers_each_receive_a_copy() {
    let first = MemoryTransport::new();
    let second = first.peer();
    first.subscribe("t").await.unwrap();
    second.subscribe("t").await.unwrap();

    for i in 0..10u8 {
        first.send("t", &MessageEnvelope::new(vec![i])).await.unwrap();
    }
    for i in 0..10u8 {
        assert_eq!(recv(&first, "t").await.payload, vec![i]);
        assert_eq!(recv(&second, "t").await.payload, vec![i]);
    }
}

#[tokio::test]
async fn test_memory_peer_unsubscribe_and_close_are_isolated() {
    let first = MemoryTransport::new();
    let second = first.peer();
    first.subscribe("t").await.unwrap();
    second.subscribe("t").await.unwrap();

    first.unsubscribe("t").await.unwrap();
    assert_eq!(first.subscription_count(), 0);
    assert_eq!(second.subscription_count(), 1);

    first.close().await.unwrap();
    second.send("t", &MessageEnvelope::new("still here")).await.unwrap();
    assert_eq!(recv(&second, "t").await.payload, b"still here");
    assert_eq!(
        first.send("t", &MessageEnvelope::default()).await,
        Err(TransportError::Closed)
    );
}

#[tokio::test]
async fn test_memory_injected_failures() {
    let transport = MemoryTransport::new();
    transport.inject_receive_error("t", TransportError::Io("down".to_string()));
    let err = transport.receive("t").await.unwrap_err();
    assert_eq!(err, TransportError::Io("down".to_string()));

    transport.fail_next_sends([TransportError::ConnectionReset("EOF".to_string())]);
    assert!(transport.send("t", &MessageEnvelope::default()).await.is_err());
    assert!(transport.send("t", &MessageEnvelope::default()).await.is_ok());
}

#[tokio::test]
async fn test_memory_unsubscribe_wakes_parked_receive() {
    let transport = std::sync::Arc::new(MemoryTransport::new());
    transport.subscribe("t").await.unwrap();

    let parked = {
        let transport = transport.clone();
        tokio::spawn(async move { transport.receive("t").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    transport.unsubscribe("t").await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), parked)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, Err(TransportError::Closed));
    assert_eq!(transport.subscription_count(), 0);
}

#[tokio::test]
async fn test_memory_close_rejects_further_use() {
    let transport = MemoryTransport::new();
    transport.subscribe("t").await.unwrap();
    transport.close().await.unwrap();

    assert_eq!(transport.subscription_count(), 0);
    assert_eq!(
        transport.send("t", &MessageEnvelope::default()).await,
        Err(TransportError::Closed)
    );
    assert_eq!(transport.receive("t").await, Err(TransportError::Closed));
}
