//! Broker event dispatch.
//!
//! `handle` is the only place connection state and message ids change in
//! response to the broker. It performs no I/O.

use tracing::{debug, info, warn};

use super::state::{ConnectionState, MqttClientSession};
use crate::protocol::{CONNECTION_ACCEPTED, ProtocolEvent};

/// What an event meant for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Connected,
    ConnectRefused(u8),
    Disconnected,
    /// The publish with this id was acknowledged and the id advanced.
    Acknowledged(u16),
    Ignored,
}

pub fn handle(session: &mut MqttClientSession, event: &ProtocolEvent) -> Outcome {
    match *event {
        ProtocolEvent::ConnectAck { code, .. } if code != CONNECTION_ACCEPTED => {
            warn!(code, "broker refused the connection");
            session.set_state(ConnectionState::Disconnected);
            Outcome::ConnectRefused(code)
        }
        ProtocolEvent::ConnectAck {
            session_present, ..
        } => {
            if session.state() != ConnectionState::AwaitingAck {
                debug!(state = %session.state(), "ignoring unexpected CONNACK");
                return Outcome::Ignored;
            }
            session.set_state(ConnectionState::Connected);
            info!(session_present, "connected to broker");
            Outcome::Connected
        }
        ProtocolEvent::Disconnect => {
            warn!(state = %session.state(), "broker closed the connection");
            session.set_state(ConnectionState::Disconnected);
            Outcome::Disconnected
        }
        ProtocolEvent::PublishAck { message_id, code } => {
            if code != 0 {
                warn!(message_id, code, "publish rejected by broker");
                return Outcome::Ignored;
            }
            if session.publish.acknowledge(message_id) {
                debug!(
                    message_id,
                    next = session.publish.message_id(),
                    "publish acknowledged"
                );
                Outcome::Acknowledged(message_id)
            } else {
                warn!(
                    message_id,
                    in_flight = ?session.publish.in_flight(),
                    "acknowledgement for a publish that is not in flight"
                );
                Outcome::Ignored
            }
        }
        ProtocolEvent::SubscribeAck { message_id } => {
            debug!(message_id, "SUBACK");
            Outcome::Ignored
        }
        ProtocolEvent::UnsubscribeAck { message_id } => {
            debug!(message_id, "UNSUBACK");
            Outcome::Ignored
        }
        ProtocolEvent::Unknown { ref kind } => {
            debug!(%kind, "ignoring broker packet");
            Outcome::Ignored
        }
    }
}
