use std::fmt;

use tokio::time::Instant;
use tracing::{debug, info};

/// Where the session is in the connect sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Resolving,
    Connecting,
    AwaitingAck,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Resolving => "resolving",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingAck => "awaiting-ack",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Counts the connection attempts left before the client gives up.
///
/// The budget only ever decreases while attempts fail. By default a
/// successful connect restores it, so it counts consecutive failures; the
/// device firmware never restored its counter, which
/// `session.reset_budget_on_connect = false` reproduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    initial: u32,
    remaining: u32,
}

impl RetryBudget {
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            remaining: initial,
        }
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Records one failed attempt and returns what is left.
    pub fn consume(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    pub fn reset(&mut self) {
        self.remaining = self.initial;
    }
}

/// Message id bookkeeping for the QoS 1 telemetry publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    topic: String,
    message_id: u16,
    in_flight: Option<u16>,
}

impl PublishRecord {
    pub const FIRST_MESSAGE_ID: u16 = 1;

    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message_id: Self::FIRST_MESSAGE_ID,
            in_flight: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Id the next publish is sent with.
    pub fn message_id(&self) -> u16 {
        self.message_id
    }

    pub fn in_flight(&self) -> Option<u16> {
        self.in_flight
    }

    /// Whether publishing now would retransmit an unacknowledged id.
    pub fn is_retransmission(&self) -> bool {
        self.in_flight == Some(self.message_id)
    }

    pub fn mark_sent(&mut self) {
        self.in_flight = Some(self.message_id);
    }

    /// Advances the message id if `message_id` acknowledges the publish in
    /// flight. Ids wrap from 65535 back to 1; zero is never used.
    pub fn acknowledge(&mut self, message_id: u16) -> bool {
        if self.in_flight != Some(message_id) {
            return false;
        }
        self.in_flight = None;
        self.message_id = match self.message_id.checked_add(1) {
            Some(next) => next,
            None => Self::FIRST_MESSAGE_ID,
        };
        true
    }

    /// Forgets the unacknowledged publish; the id is kept.
    pub fn reset_in_flight(&mut self) {
        self.in_flight = None;
    }
}

/// Everything one client connection carries between the connect sequence
/// and the publish loop.
#[derive(Debug, Clone)]
pub struct MqttClientSession {
    state: ConnectionState,
    pub publish: PublishRecord,
    pub retry: RetryBudget,
    pub next_alive: Option<Instant>,
}

impl MqttClientSession {
    pub fn new(topic: impl Into<String>, retry_budget: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            publish: PublishRecord::new(topic),
            retry: RetryBudget::new(retry_budget),
            next_alive: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if next == ConnectionState::Connected || self.state == ConnectionState::Connected {
            info!(from = %self.state, to = %next, "connection state changed");
        } else {
            debug!(from = %self.state, to = %next, "connection state changed");
        }
        self.state = next;
    }

    /// Drops back to `Disconnected` and clears per-connection state.
    pub fn disconnect(&mut self) {
        self.set_state(ConnectionState::Disconnected);
        self.publish.reset_in_flight();
        self.next_alive = None;
    }
}
