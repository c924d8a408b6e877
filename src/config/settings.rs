use std::collections::HashMap;

use serde::Deserialize;

use super::{BusType, HostInfo, MessageBusConfig};
use crate::utils::Result;

/// Top-level configuration settings for the application.
///
/// Includes the broker endpoint, backend options, logging and the topics the
/// binary listens on.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub broker: HostInfo,
    pub bus_type: String,
    pub optional: HashMap<String, String>,
    pub log: LogSettings,
    pub subscribe: SubscribeSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Topics the binary subscribes to on startup.
#[derive(Debug, Deserialize, Clone)]
pub struct SubscribeSettings {
    pub topics: Vec<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialHostSettings>,
    pub bus_type: Option<String>,
    pub optional: Option<HashMap<String, String>>,
    pub log: Option<PartialLogSettings>,
    pub subscribe: Option<PartialSubscribeSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHostSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialSubscribeSettings {
    pub topics: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: HostInfo::new("127.0.0.1", 8080, "ws"),
            bus_type: BusType::WebSocket.to_string(),
            optional: HashMap::new(),
            log: LogSettings {
                level: "info".to_string(),
            },
            subscribe: SubscribeSettings {
                topics: vec!["#".to_string()],
            },
        }
    }
}

impl Settings {
    /// Builds the client configuration. Fails on an unknown bus type.
    pub fn message_bus_config(&self) -> Result<MessageBusConfig> {
        Ok(MessageBusConfig {
            broker: self.broker.clone(),
            bus_type: self.bus_type.parse()?,
            optional: self.optional.clone(),
        })
    }
}
