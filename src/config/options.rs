//! Typed client options
//!
//! The open `optional` bag of a [`MessageBusConfig`] is mapped key by key
//! onto [`ClientOptions`] (key names compare case-insensitively). Keys this client does not know are kept in
//! `extra` untouched for the transport binding. A value that does not parse
//! as its field's type fails construction with an error naming the key.

use std::collections::HashMap;
use std::time::Duration;

use super::MessageBusConfig;
use crate::utils::{MessagingError, Result};

pub const OPTION_PASSWORD: &str = "Password";
pub const OPTION_CONNECT_TIMEOUT: &str = "ConnectTimeout";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Sent to the broker as the authentication token.
    pub password: Option<String>,
    /// Bound on establishing a broker connection. Configured in whole seconds.
    pub connect_timeout: Duration,
    /// Options not interpreted by the client.
    pub extra: HashMap<String, String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            password: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            extra: HashMap::new(),
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &MessageBusConfig) -> Result<Self> {
        Self::from_optional(&config.optional)
    }

    pub fn from_optional(optional: &HashMap<String, String>) -> Result<Self> {
        let mut options = Self::default();
        for (key, value) in optional {
            if key.eq_ignore_ascii_case(OPTION_PASSWORD) {
                options.password = Some(value.clone());
            } else if key.eq_ignore_ascii_case(OPTION_CONNECT_TIMEOUT) {
                let secs: u64 = value.trim().parse().map_err(|_| {
                    MessagingError::configuration(
                        OPTION_CONNECT_TIMEOUT,
                        format!("expected a whole number of seconds, got '{value}'"),
                    )
                })?;
                if secs == 0 {
                    return Err(MessagingError::configuration(
                        OPTION_CONNECT_TIMEOUT,
                        "must be greater than zero",
                    ));
                }
                options.connect_timeout = Duration::from_secs(secs);
            } else {
                options.extra.insert(key.clone(), value.clone());
            }
        }
        Ok(options)
    }
}
