use serde::Deserialize;

/// Top-level configuration settings for the client.
///
/// Every value has a deployment default; files and environment variables
/// override individual fields.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub device: DeviceSettings,
    pub tls: TlsSettings,
    pub session: SessionSettings,
    pub telemetry: TelemetrySettings,
    pub time: TimeSettings,
    pub log: LogSettings,
}

/// Where the broker lives.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub hostname: String,
    pub port: u16,
    /// Empty lets the broker assign an identifier (clean session only).
    pub client_id: String,
}

/// Device identity used for broker authentication.
///
/// The MQTT username is `device@application`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DeviceSettings {
    pub device: String,
    pub application: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TlsSettings {
    /// Verify the broker certificate chain against the registered CA.
    ///
    /// Setting this to `false` is an explicit opt-out: the peer name is still
    /// checked, but any chain is accepted.
    pub verify_certificate_chain: bool,
    /// PEM or DER broker CA. Required while `verify_certificate_chain` is on.
    pub ca_certificate_path: Option<String>,
    pub alpn_protocols: Vec<String>,
    pub connect_timeout_secs: u64,
}

/// Connection retry policy and steady-state timing.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionSettings {
    pub retry_budget: u32,
    pub retry_delay_secs: u64,
    pub ack_timeout_secs: u64,
    pub resolve_retries: u32,
    pub resolve_timeout_secs: u64,
    pub keep_alive_secs: u64,
    pub poll_interval_secs: u64,
    /// Restore the retry budget after every successful connect, so it counts
    /// consecutive failures. When `false` the budget covers the process
    /// lifetime, matching the device firmware.
    pub reset_budget_on_connect: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TelemetrySettings {
    pub topic: String,
    pub max_payload_len: usize,
    /// Reading reported by the fixed temperature source.
    pub temperature: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimeSettings {
    /// SNTP server as `host:port`.
    pub server: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Any field may be omitted. Missing values are filled from
/// `Settings::default()`.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub device: Option<PartialDeviceSettings>,
    pub tls: Option<PartialTlsSettings>,
    pub session: Option<PartialSessionSettings>,
    pub telemetry: Option<PartialTelemetrySettings>,
    pub time: Option<PartialTimeSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialBrokerSettings {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialDeviceSettings {
    pub device: Option<String>,
    pub application: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialTlsSettings {
    pub verify_certificate_chain: Option<bool>,
    pub ca_certificate_path: Option<String>,
    pub alpn_protocols: Option<Vec<String>>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialSessionSettings {
    pub retry_budget: Option<u32>,
    pub retry_delay_secs: Option<u64>,
    pub ack_timeout_secs: Option<u64>,
    pub resolve_retries: Option<u32>,
    pub resolve_timeout_secs: Option<u64>,
    pub keep_alive_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub reset_budget_on_connect: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialTelemetrySettings {
    pub topic: Option<String>,
    pub max_payload_len: Option<usize>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialTimeSettings {
    pub server: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            hostname: "mqtt.sandbox.drogue.cloud".to_string(),
            port: 8883,
            client_id: String::new(),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device: "device1".to_string(),
            application: "app1".to_string(),
            password: String::new(),
        }
    }
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            verify_certificate_chain: true,
            ca_certificate_path: None,
            alpn_protocols: Vec::new(),
            connect_timeout_secs: 10,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            retry_budget: 5,
            retry_delay_secs: 60,
            ack_timeout_secs: 5,
            resolve_retries: 3,
            resolve_timeout_secs: 5,
            keep_alive_secs: 60,
            poll_interval_secs: 5,
            reset_budget_on_connect: true,
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            topic: "telemetry".to_string(),
            max_payload_len: 64,
            temperature: 42.0,
        }
    }
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            server: "time.google.com:123".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let broker = self.broker.unwrap_or_default();
        let device = self.device.unwrap_or_default();
        let tls = self.tls.unwrap_or_default();
        let session = self.session.unwrap_or_default();
        let telemetry = self.telemetry.unwrap_or_default();
        let time = self.time.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            broker: BrokerSettings {
                hostname: broker.hostname.unwrap_or(defaults.broker.hostname),
                port: broker.port.unwrap_or(defaults.broker.port),
                client_id: broker.client_id.unwrap_or(defaults.broker.client_id),
            },
            device: DeviceSettings {
                device: device.device.unwrap_or(defaults.device.device),
                application: device.application.unwrap_or(defaults.device.application),
                password: device.password.unwrap_or(defaults.device.password),
            },
            tls: TlsSettings {
                verify_certificate_chain: tls
                    .verify_certificate_chain
                    .unwrap_or(defaults.tls.verify_certificate_chain),
                ca_certificate_path: tls.ca_certificate_path.or(defaults.tls.ca_certificate_path),
                alpn_protocols: tls.alpn_protocols.unwrap_or(defaults.tls.alpn_protocols),
                connect_timeout_secs: tls
                    .connect_timeout_secs
                    .unwrap_or(defaults.tls.connect_timeout_secs),
            },
            session: SessionSettings {
                retry_budget: session.retry_budget.unwrap_or(defaults.session.retry_budget),
                retry_delay_secs: session
                    .retry_delay_secs
                    .unwrap_or(defaults.session.retry_delay_secs),
                ack_timeout_secs: session
                    .ack_timeout_secs
                    .unwrap_or(defaults.session.ack_timeout_secs),
                resolve_retries: session
                    .resolve_retries
                    .unwrap_or(defaults.session.resolve_retries),
                resolve_timeout_secs: session
                    .resolve_timeout_secs
                    .unwrap_or(defaults.session.resolve_timeout_secs),
                keep_alive_secs: session
                    .keep_alive_secs
                    .unwrap_or(defaults.session.keep_alive_secs),
                poll_interval_secs: session
                    .poll_interval_secs
                    .unwrap_or(defaults.session.poll_interval_secs),
                reset_budget_on_connect: session
                    .reset_budget_on_connect
                    .unwrap_or(defaults.session.reset_budget_on_connect),
            },
            telemetry: TelemetrySettings {
                topic: telemetry.topic.unwrap_or(defaults.telemetry.topic),
                max_payload_len: telemetry
                    .max_payload_len
                    .unwrap_or(defaults.telemetry.max_payload_len),
                temperature: telemetry
                    .temperature
                    .unwrap_or(defaults.telemetry.temperature),
            },
            time: TimeSettings {
                server: time.server.unwrap_or(defaults.time.server),
                timeout_secs: time.timeout_secs.unwrap_or(defaults.time.timeout_secs),
            },
            log: LogSettings {
                level: log.level.unwrap_or(defaults.log.level),
            },
        }
    }
}
