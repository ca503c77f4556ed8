//! Wall clock derived from uptime plus a one-time offset.
//!
//! `ClockSource` is shared with the TLS stack through `Arc`, which reads it
//! during every handshake to check certificate validity periods. The offset
//! can only be recorded once: a later sync result must not make the clock
//! jump while a session is running.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::DateTime;
use rustls::pki_types::UnixTime;
use rustls::time_provider::TimeProvider;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug)]
pub struct ClockSource {
    origin: Instant,
    offset_millis: OnceLock<i64>,
}

impl Default for ClockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_millis: OnceLock::new(),
        }
    }

    fn uptime_millis(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Records the epoch time reported by the time service.
    ///
    /// Returns `false` (and changes nothing) if an offset was already recorded.
    pub fn record_offset(&self, epoch_seconds: i64) -> bool {
        let offset = epoch_seconds
            .saturating_mul(1000)
            .saturating_sub(self.uptime_millis());

        match self.offset_millis.set(offset) {
            Ok(()) => {
                info!(
                    acquired = %format_epoch(epoch_seconds),
                    offset_millis = offset,
                    "clock synchronised"
                );
                true
            }
            Err(_) => {
                warn!(epoch_seconds, "clock offset already recorded; ignoring new value");
                false
            }
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.offset_millis.get().is_some()
    }

    /// Current time in whole seconds since the UNIX epoch.
    ///
    /// Before synchronisation this is the uptime in seconds.
    pub fn now(&self) -> i64 {
        let offset = self.offset_millis.get().copied().unwrap_or(0);
        self.uptime_millis().saturating_add(offset) / 1000
    }
}

impl TimeProvider for ClockSource {
    // None until synchronised, so certificate checks fail instead of running against 1970.
    fn current_time(&self) -> Option<UnixTime> {
        let offset = *self.offset_millis.get()?;
        let millis = u64::try_from(self.uptime_millis().checked_add(offset)?).ok()?;
        Some(UnixTime::since_unix_epoch(Duration::from_millis(millis)))
    }
}

fn format_epoch(epoch_seconds: i64) -> String {
    DateTime::from_timestamp(epoch_seconds, 0)
        .map(|t| t.format("%FT%T").to_string())
        .unwrap_or_else(|| epoch_seconds.to_string())
}
