//! Steady-state publishing.
//!
//! Each cycle publishes one reading, then services broker input until the
//! keep-alive deadline passes. Waits are capped at `poll_interval` so a
//! deadline is never overshot by more than one read.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::handler::{self, Outcome};
use super::state::MqttClientSession;
use crate::config::Settings;
use crate::protocol::{ProtocolEvent, codec};
use crate::telemetry::{self, TelemetrySource};
use crate::transport::{Input, Transport};
use crate::utils::error::{Error, Result};

/// Why the publish loop stopped.
#[derive(Debug)]
pub enum SchedulerExit {
    /// The broker closed the connection or refused it mid-session.
    Disconnected,
    /// Writing to or reading from the transport failed.
    TransportFailed(Error),
    /// The requested number of cycles ran.
    CyclesCompleted,
}

pub struct PublishScheduler<S> {
    source: S,
    keep_alive: Duration,
    poll_interval: Duration,
    max_payload_len: usize,
}

impl<S> std::fmt::Debug for PublishScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishScheduler")
            .field("keep_alive", &self.keep_alive)
            .field("poll_interval", &self.poll_interval)
            .field("max_payload_len", &self.max_payload_len)
            .finish_non_exhaustive()
    }
}

impl<S: TelemetrySource> PublishScheduler<S> {
    pub fn new(
        source: S,
        keep_alive: Duration,
        poll_interval: Duration,
        max_payload_len: usize,
    ) -> Self {
        Self {
            source,
            keep_alive,
            poll_interval,
            max_payload_len,
        }
    }

    pub fn from_settings(source: S, settings: &Settings) -> Self {
        Self::new(
            source,
            settings.session.keep_alive(),
            settings.session.poll_interval(),
            settings.telemetry.max_payload_len,
        )
    }

    /// Publishes until the connection ends.
    ///
    /// Only payload and encoding failures are returned as errors; everything
    /// that ends the connection is reported through [`SchedulerExit`].
    pub async fn run(
        &mut self,
        session: &mut MqttClientSession,
        transport: &mut Transport,
    ) -> Result<SchedulerExit> {
        self.drive(session, transport, None).await
    }

    /// Like [`PublishScheduler::run`], stopping after `cycles` keep-alive periods.
    pub async fn run_cycles(
        &mut self,
        session: &mut MqttClientSession,
        transport: &mut Transport,
        cycles: u32,
    ) -> Result<SchedulerExit> {
        self.drive(session, transport, Some(cycles)).await
    }

    async fn drive(
        &mut self,
        session: &mut MqttClientSession,
        transport: &mut Transport,
        cycles: Option<u32>,
    ) -> Result<SchedulerExit> {
        if !session.is_connected() {
            return Err(Error::NotConnected);
        }

        let mut next_alive = Instant::now() + self.keep_alive;
        session.next_alive = Some(next_alive);
        let mut completed = 0u32;

        loop {
            if cycles.is_some_and(|limit| completed >= limit) {
                debug!(completed, "publish cycles completed");
                return Ok(SchedulerExit::CyclesCompleted);
            }

            if let Err(e) = self.publish(session, transport).await? {
                warn!(error = %e, "publish failed");
                return Ok(SchedulerExit::TransportFailed(e));
            }

            loop {
                let now = Instant::now();
                if now >= next_alive {
                    break;
                }
                let wait = self.poll_interval.min(next_alive - now);

                let input = match transport.wait_for_input(wait).await {
                    Ok(input) => input,
                    Err(e) => {
                        warn!(error = %e, "read from broker failed");
                        return Ok(SchedulerExit::TransportFailed(e.into()));
                    }
                };
                match input {
                    Input::Idle => continue,
                    Input::Closed => {
                        handler::handle(session, &ProtocolEvent::Disconnect);
                        return Ok(SchedulerExit::Disconnected);
                    }
                    Input::Ready(_) => {}
                }

                let events = match codec::decode_all(transport.inbound()) {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(error = %e, "undecodable input from broker");
                        return Ok(SchedulerExit::TransportFailed(e.into()));
                    }
                };
                for event in &events {
                    match handler::handle(session, event) {
                        Outcome::Disconnected | Outcome::ConnectRefused(_) => {
                            return Ok(SchedulerExit::Disconnected);
                        }
                        _ => {}
                    }
                }
            }

            next_alive += self.keep_alive;
            session.next_alive = Some(next_alive);
            completed += 1;
        }
    }

    /// Sends the reading for this cycle. The outer error is fatal; the inner
    /// one means the transport is gone.
    async fn publish(
        &mut self,
        session: &mut MqttClientSession,
        transport: &mut Transport,
    ) -> Result<std::result::Result<(), Error>> {
        let reading = self.source.sample();
        let payload = telemetry::encode(&reading, self.max_payload_len)?;
        let message_id = session.publish.message_id();
        let dup = session.publish.is_retransmission();
        let packet = codec::encode_publish(session.publish.topic(), message_id, dup, &payload)?;

        if let Err(e) = transport.send(&packet).await {
            return Ok(Err(e.into()));
        }
        session.publish.mark_sent();
        info!(
            topic = session.publish.topic(),
            message_id,
            dup,
            temp = reading.temp,
            "telemetry published"
        );
        Ok(Ok(()))
    }
}
