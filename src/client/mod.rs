//! The `client` module ties the session phases together.
//!
//! It provides `Client`, which owns one `MqttClientSession` and alternates
//! between `ConnectionManager::connect` and `PublishScheduler::run` until the
//! retry budget is spent.

pub mod telemetry_client;
pub use telemetry_client::Client;
