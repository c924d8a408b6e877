//! The `config` module holds everything a message client is configured
//! with: the broker endpoint, the backend type and the typed option mapping,
//! plus the application settings loaded from file and environment.

mod bus;
mod options;
mod settings;

use config::{Config, ConfigError, Environment, File};

pub use bus::{BusType, HostInfo, MessageBusConfig};
pub use options::{ClientOptions, DEFAULT_CONNECT_TIMEOUT, OPTION_CONNECT_TIMEOUT, OPTION_PASSWORD};
pub use settings::{LogSettings, PartialSettings, Settings, SubscribeSettings};

/// Loads the configuration from the default file and environment variables
/// (`TOPICBUS__BROKER__HOST=...`), merged over default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::with_prefix("TOPICBUS").separator("__"));

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        broker: HostInfo {
            host: partial
                .broker
                .as_ref()
                .and_then(|b| b.host.clone())
                .unwrap_or(default.broker.host),
            port: partial
                .broker
                .as_ref()
                .and_then(|b| b.port)
                .unwrap_or(default.broker.port),
            protocol: partial
                .broker
                .as_ref()
                .and_then(|b| b.protocol.clone())
                .unwrap_or(default.broker.protocol),
        },
        bus_type: partial.bus_type.unwrap_or(default.bus_type),
        optional: partial.optional.unwrap_or(default.optional),
        log: LogSettings {
            level: partial
                .log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
        subscribe: SubscribeSettings {
            topics: partial
                .subscribe
                .and_then(|s| s.topics)
                .unwrap_or(default.subscribe.topics),
        },
    })
}
