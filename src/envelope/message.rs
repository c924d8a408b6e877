use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The only envelope API version this client understands.
pub const API_VERSION: &str = "v1";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Reasons an envelope is rejected by validation or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("unsupported API version '{0}', expected '{expected}'", expected = API_VERSION)]
    UnsupportedApiVersion(String),

    #[error("{field} '{value}' is not a valid UUID")]
    InvalidUuid { field: &'static str, value: String },

    #[error("content type must not be empty")]
    MissingContentType,

    #[error("unable to decode envelope JSON: {0}")]
    Json(String),
}

/// A published message together with its routing metadata.
///
/// Empty `request_id`/`correlation_id` mean "not set". The zero value
/// (`MessageEnvelope::default()`) carries nothing and is what unsubscribe
/// publishes to wake a parked receive loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,

    #[serde(rename = "requestID", default)]
    pub request_id: String,

    #[serde(rename = "correlationID", default)]
    pub correlation_id: String,

    #[serde(rename = "contentType", default)]
    pub content_type: String,

    /// 0 for success, anything else marks the payload as an error description.
    #[serde(rename = "errorCode", default)]
    pub error_code: i32,

    #[serde(default)]
    pub payload: Vec<u8>,

    #[serde(rename = "queryParams", default)]
    pub query_params: HashMap<String, String>,

    /// Topic (standard scheme) the message was received on.
    #[serde(skip)]
    pub received_topic: String,
}

impl MessageEnvelope {
    /// Plain envelope carrying `payload` and nothing else.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// Envelope for a request: fresh request and correlation IDs, JSON
    /// content type.
    pub fn for_request(
        payload: impl Into<Vec<u8>>,
        query_params: Option<HashMap<String, String>>,
    ) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            request_id: Uuid::new_v4().to_string(),
            correlation_id: Uuid::new_v4().to_string(),
            content_type: CONTENT_TYPE_JSON.to_string(),
            payload: payload.into(),
            query_params: query_params.unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Envelope answering a request. The IDs must be UUIDs and the content
    /// type must be set.
    pub fn for_response(
        payload: impl Into<Vec<u8>>,
        request_id: &str,
        correlation_id: &str,
        content_type: &str,
    ) -> Result<Self, EnvelopeError> {
        let envelope = Self {
            api_version: API_VERSION.to_string(),
            request_id: request_id.to_string(),
            correlation_id: correlation_id.to_string(),
            content_type: content_type.to_string(),
            payload: payload.into(),
            ..Default::default()
        };
        envelope.validate()?;
        Ok(envelope)
    }

    /// Envelope reporting a failure for `request_id`.
    pub fn from_error(request_id: &str, message: &str) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            request_id: request_id.to_string(),
            content_type: CONTENT_TYPE_TEXT.to_string(),
            error_code: 1,
            payload: message.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    /// Decodes and validates an envelope from its JSON encoding.
    pub fn from_json(data: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Self =
            serde_json::from_slice(data).map_err(|e| EnvelopeError::Json(e.to_string()))?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// Encodes the envelope as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, EnvelopeError> {
        serde_json::to_vec(self).map_err(|e| EnvelopeError::Json(e.to_string()))
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Checks the envelope invariants: supported API version, UUID-shaped
    /// IDs when present, non-empty content type.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.api_version != API_VERSION {
            return Err(EnvelopeError::UnsupportedApiVersion(
                self.api_version.clone(),
            ));
        }
        check_uuid("request ID", &self.request_id)?;
        check_uuid("correlation ID", &self.correlation_id)?;
        if self.content_type.is_empty() {
            return Err(EnvelopeError::MissingContentType);
        }
        Ok(())
    }

    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }
}

fn check_uuid(field: &'static str, value: &str) -> Result<(), EnvelopeError> {
    if value.is_empty() || Uuid::parse_str(value).is_ok() {
        return Ok(());
    }
    Err(EnvelopeError::InvalidUuid {
        field,
        value: value.to_string(),
    })
}
