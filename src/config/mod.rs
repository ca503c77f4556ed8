mod settings;

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, DeviceSettings, LogSettings, PartialSettings, SessionSettings, Settings,
    TelemetrySettings, TimeSettings, TlsSettings,
};

use crate::utils::error::{Error, Result};

/// Longest accepted `device@application` username.
pub const MAX_USERNAME_LEN: usize = 512;

/// Prefix for environment overrides, e.g. `TELEMQ_BROKER__HOSTNAME`.
pub const ENV_PREFIX: &str = "TELEMQ";

/// Loads the configuration from `config/default` and environment variables,
/// merged over `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(Path::new("config/default"))
}

/// Same as [`load_config`] with an explicit file stem; the file is optional
/// and may be TOML, YAML or JSON.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(&path.to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("tls.alpn_protocols"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

impl Settings {
    /// MQTT username, `device@application`.
    pub fn username(&self) -> String {
        format!("{}@{}", self.device.device, self.device.application)
    }

    /// Rejects values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field, reason: &str| Error::InvalidSetting {
            field,
            reason: reason.to_string(),
        };

        if self.broker.hostname.trim().is_empty() {
            return Err(invalid("broker.hostname", "must not be empty"));
        }
        if self.broker.port == 0 {
            return Err(invalid("broker.port", "must not be zero"));
        }
        let username = self.username();
        if username.len() > MAX_USERNAME_LEN {
            return Err(Error::InvalidSetting {
                field: "device",
                reason: format!(
                    "username is {} bytes, limit is {MAX_USERNAME_LEN}",
                    username.len()
                ),
            });
        }
        if self.telemetry.topic.is_empty() {
            return Err(invalid("telemetry.topic", "must not be empty"));
        }
        if self.telemetry.topic.contains(['+', '#']) {
            return Err(invalid("telemetry.topic", "wildcards cannot be published to"));
        }
        if self.telemetry.max_payload_len == 0 {
            return Err(invalid("telemetry.max_payload_len", "must not be zero"));
        }
        if self.session.retry_budget == 0 {
            return Err(invalid("session.retry_budget", "must allow at least one attempt"));
        }
        if self.session.keep_alive_secs == 0 || self.session.keep_alive_secs > u64::from(u16::MAX)
        {
            return Err(invalid(
                "session.keep_alive_secs",
                "must be between 1 and 65535",
            ));
        }
        for (field, value) in [
            ("session.ack_timeout_secs", self.session.ack_timeout_secs),
            ("session.poll_interval_secs", self.session.poll_interval_secs),
            ("session.resolve_timeout_secs", self.session.resolve_timeout_secs),
            ("tls.connect_timeout_secs", self.tls.connect_timeout_secs),
            ("time.timeout_secs", self.time.timeout_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must not be zero"));
            }
        }
        Ok(())
    }
}

impl SessionSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
