//! # telemq
//!
//! `telemq` is a TLS-secured MQTT 3.1.1 telemetry client. It connects to a
//! broker, authenticates as `device@application`, publishes a reading at a
//! fixed interval with QoS 1 and reconnects with a bounded retry budget.
//!
//! ## Core Modules
//!
//! - `clock`: wall time from uptime plus an SNTP-learned offset, used for
//!   certificate validity checks.
//! - `credentials`: tag-addressed CA certificates and keys for the TLS layer.
//! - `transport`: DNS resolution, TLS connections and the bounded-wait byte stream.
//! - `protocol`: MQTT packet encoding and the broker event set.
//! - `session`: connection state machine, event handler and publish scheduler.
//! - `telemetry`: readings and their JSON payload.
//! - `client`: the driver sequencing connect and publish phases.
//! - `config`: layered configuration from files and environment.
//! - `utils`: error type and logging setup.

pub mod client;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod utils;

pub use client::Client;
pub use utils::error::{Error, Result};

#[cfg(test)]
mod testing;
