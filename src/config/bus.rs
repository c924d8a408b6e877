use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::utils::MessagingError;

/// Connection endpoint of the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostInfo {
    pub host: String,
    pub port: u16,
    pub protocol: String,
}

impl HostInfo {
    pub fn new(host: impl Into<String>, port: u16, protocol: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: protocol.into(),
        }
    }

    /// `protocol://host:port`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// True when no usable endpoint was configured.
    pub fn is_empty(&self) -> bool {
        self.host.is_empty() || self.port == 0 || self.protocol.is_empty()
    }
}

/// Which backend binding the client runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BusType {
    #[default]
    WebSocket,
    Memory,
}

impl FromStr for BusType {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "websocket" | "ws" => Ok(BusType::WebSocket),
            "memory" => Ok(BusType::Memory),
            other => Err(MessagingError::configuration(
                "Type",
                format!("unsupported message bus type '{other}'"),
            )),
        }
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusType::WebSocket => write!(f, "websocket"),
            BusType::Memory => write!(f, "memory"),
        }
    }
}

/// Everything needed to construct a message client. Used once, at
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBusConfig {
    pub broker: HostInfo,
    pub bus_type: BusType,
    /// Implementation specific options, see [`super::ClientOptions`].
    pub optional: HashMap<String, String>,
}
