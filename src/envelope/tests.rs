use std::collections::HashMap;

use super::message::*;

const TEST_REQUEST_ID: &str = "3ab0e022-464b-4bfe-bf7f-b0154093ddad";
const TEST_CORRELATION_ID: &str = "fa1def22-96de-4d44-8811-00333438c8e3";
const TEST_PAYLOAD: &str = r#"{"data" : "myData"}"#;

fn valid_envelope() -> MessageEnvelope {
    MessageEnvelope {
        api_version: API_VERSION.to_string(),
        request_id: TEST_REQUEST_ID.to_string(),
        correlation_id: TEST_CORRELATION_ID.to_string(),
        content_type: CONTENT_TYPE_JSON.to_string(),
        payload: TEST_PAYLOAD.as_bytes().to_vec(),
        ..Default::default()
    }
}

fn decode(envelope: &MessageEnvelope) -> Result<MessageEnvelope, EnvelopeError> {
    let encoded = serde_json::to_vec(envelope).unwrap();
    MessageEnvelope::from_json(&encoded)
}

#[test]
fn test_new_envelope() {
    let envelope = MessageEnvelope::new(TEST_PAYLOAD)
        .with_correlation_id(TEST_CORRELATION_ID)
        .with_content_type(CONTENT_TYPE_JSON);

    assert_eq!(envelope.api_version, API_VERSION);
    assert_eq!(envelope.correlation_id, TEST_CORRELATION_ID);
    assert_eq!(envelope.content_type, CONTENT_TYPE_JSON);
    assert_eq!(envelope.payload, TEST_PAYLOAD.as_bytes());
    assert!(envelope.query_params.is_empty());
}

#[test]
fn test_new_envelope_empty() {
    let envelope = MessageEnvelope::new(Vec::new());
    assert_eq!(envelope.api_version, API_VERSION);
    assert!(envelope.request_id.is_empty());
    assert!(envelope.correlation_id.is_empty());
    assert!(envelope.content_type.is_empty());
    assert!(envelope.payload.is_empty());
    assert_eq!(envelope.error_code, 0);
}

#[test]
fn test_for_request_generates_ids() {
    let params = HashMap::from([("foo".to_string(), "bar".to_string())]);
    let envelope = MessageEnvelope::for_request(TEST_PAYLOAD, Some(params.clone()));

    assert!(uuid::Uuid::parse_str(&envelope.request_id).is_ok());
    assert!(uuid::Uuid::parse_str(&envelope.correlation_id).is_ok());
    assert_ne!(envelope.request_id, envelope.correlation_id);
    assert_eq!(envelope.content_type, CONTENT_TYPE_JSON);
    assert_eq!(envelope.error_code, 0);
    assert_eq!(envelope.query_params, params);
    assert!(envelope.validate().is_ok());
}

#[test]
fn test_for_request_without_query_params() {
    let envelope = MessageEnvelope::for_request(TEST_PAYLOAD, None);
    assert!(envelope.query_params.is_empty());
}

#[test]
fn test_for_response_valid() {
    let envelope = MessageEnvelope::for_response(
        TEST_PAYLOAD,
        TEST_REQUEST_ID,
        TEST_CORRELATION_ID,
        CONTENT_TYPE_JSON,
    )
    .unwrap();
    assert_eq!(envelope.request_id, TEST_REQUEST_ID);
    assert_eq!(envelope.correlation_id, TEST_CORRELATION_ID);
    assert_eq!(envelope.api_version, API_VERSION);
}

#[test]
fn test_for_response_rejects_bad_input() {
    let bad_correlation =
        MessageEnvelope::for_response(TEST_PAYLOAD, TEST_REQUEST_ID, "123456", CONTENT_TYPE_JSON);
    assert!(matches!(
        bad_correlation,
        Err(EnvelopeError::InvalidUuid {
            field: "correlation ID",
            ..
        })
    ));

    let bad_request =
        MessageEnvelope::for_response(TEST_PAYLOAD, "123456", TEST_CORRELATION_ID, CONTENT_TYPE_JSON);
    assert!(matches!(
        bad_request,
        Err(EnvelopeError::InvalidUuid {
            field: "request ID",
            ..
        })
    ));

    let no_content_type =
        MessageEnvelope::for_response(TEST_PAYLOAD, TEST_REQUEST_ID, TEST_CORRELATION_ID, "");
    assert_eq!(no_content_type, Err(EnvelopeError::MissingContentType));
}

#[test]
fn test_from_error() {
    let envelope = MessageEnvelope::from_error(TEST_REQUEST_ID, "error: something failed");
    assert_eq!(envelope.api_version, API_VERSION);
    assert_eq!(envelope.request_id, TEST_REQUEST_ID);
    assert_eq!(envelope.error_code, 1);
    assert!(envelope.is_error());
    assert_eq!(envelope.payload, b"error: something failed");
    assert_eq!(envelope.content_type, CONTENT_TYPE_TEXT);
    assert!(envelope.query_params.is_empty());
}

#[test]
fn test_from_json_valid() {
    let decoded = decode(&valid_envelope()).unwrap();
    assert_eq!(decoded, valid_envelope());
}

#[test]
fn test_from_json_without_correlation_id() {
    let mut envelope = valid_envelope();
    envelope.correlation_id.clear();
    assert!(decode(&envelope).is_ok());
}

#[test]
fn test_from_json_rejects_other_api_version() {
    let mut envelope = valid_envelope();
    envelope.api_version = "v2".to_string();
    assert_eq!(
        decode(&envelope),
        Err(EnvelopeError::UnsupportedApiVersion("v2".to_string()))
    );
}

#[test]
fn test_unsupported_api_version_display() {
    let err = EnvelopeError::UnsupportedApiVersion("v2".to_string());
    assert_eq!(err.to_string(), "unsupported API version 'v2', expected 'v1'");
}

#[test]
fn test_from_json_rejects_non_uuid_ids() {
    let mut envelope = valid_envelope();
    envelope.request_id = "123456".to_string();
    assert!(matches!(
        decode(&envelope),
        Err(EnvelopeError::InvalidUuid { .. })
    ));

    let mut envelope = valid_envelope();
    envelope.correlation_id = "123456".to_string();
    assert!(matches!(
        decode(&envelope),
        Err(EnvelopeError::InvalidUuid { .. })
    ));
}

#[test]
fn test_from_json_rejects_empty_content_type() {
    let mut envelope = valid_envelope();
    envelope.content_type.clear();
    assert_eq!(decode(&envelope), Err(EnvelopeError::MissingContentType));
}

#[test]
fn test_from_json_rejects_garbage() {
    assert!(matches!(
        MessageEnvelope::from_json(b"not json"),
        Err(EnvelopeError::Json(_))
    ));
}

#[test]
fn test_wire_field_names() {
    let json: serde_json::Value =
        serde_json::from_slice(&valid_envelope().to_json().unwrap()).unwrap();
    assert_eq!(json["apiVersion"], API_VERSION);
    assert_eq!(json["requestID"], TEST_REQUEST_ID);
    assert_eq!(json["correlationID"], TEST_CORRELATION_ID);
    assert_eq!(json["contentType"], CONTENT_TYPE_JSON);
    assert_eq!(json["errorCode"], 0);
    assert!(json.get("receivedTopic").is_none());
}

#[test]
fn test_received_topic_not_encoded() {
    let mut envelope = valid_envelope();
    envelope.received_topic = "a/b".to_string();
    let decoded = decode(&envelope).unwrap();
    assert!(decoded.received_topic.is_empty());
}
