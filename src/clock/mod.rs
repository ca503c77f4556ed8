//! The `clock` module provides the wall clock used by the TLS layer.
//!
//! The device has no battery-backed real time clock, so wall time is derived
//! from a monotonic uptime counter plus an offset learned once from an SNTP
//! server at startup.

pub mod sntp;
pub mod source;

pub use sntp::{SntpClient, TimeSync, TimeSyncError};
pub use source::ClockSource;

/// Queries `time` once and anchors `clock` to the answer.
///
/// Must succeed before the first TLS handshake.
pub async fn synchronize(time: &dyn TimeSync, clock: &ClockSource) -> Result<i64, TimeSyncError> {
    let epoch_seconds = time.epoch_seconds().await?;
    clock.record_offset(epoch_seconds);
    Ok(epoch_seconds)
}
