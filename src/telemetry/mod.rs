//! Telemetry readings and their wire payload.

pub mod payload;

pub use payload::{FixedTemperature, PayloadError, Reading, TelemetrySource, encode};

#[cfg(test)]
mod tests;
