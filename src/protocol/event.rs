use std::fmt;

/// CONNACK return code for an accepted connection.
pub const CONNECTION_ACCEPTED: u8 = 0;

/// Broker-originated events the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    ConnectAck { session_present: bool, code: u8 },
    /// The broker closed the connection.
    Disconnect,
    /// `code` is non-zero when the acknowledgement reports a failure.
    PublishAck { message_id: u16, code: u8 },
    SubscribeAck { message_id: u16 },
    UnsubscribeAck { message_id: u16 },
    /// Anything else the broker sent; logged and ignored.
    Unknown { kind: String },
}

impl ProtocolEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolEvent::ConnectAck { .. } => "CONNACK",
            ProtocolEvent::Disconnect => "DISCONNECT",
            ProtocolEvent::PublishAck { .. } => "PUBACK",
            ProtocolEvent::SubscribeAck { .. } => "SUBACK",
            ProtocolEvent::UnsubscribeAck { .. } => "UNSUBACK",
            ProtocolEvent::Unknown { .. } => "UNKNOWN",
        }
    }
}

impl fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolEvent::ConnectAck { code, .. } => write!(f, "CONNACK (code {code})"),
            ProtocolEvent::PublishAck { message_id, code } => {
                write!(f, "PUBACK id {message_id} (code {code})")
            }
            ProtocolEvent::SubscribeAck { message_id } => write!(f, "SUBACK id {message_id}"),
            ProtocolEvent::UnsubscribeAck { message_id } => write!(f, "UNSUBACK id {message_id}"),
            ProtocolEvent::Unknown { kind } => write!(f, "unhandled {kind}"),
            ProtocolEvent::Disconnect => f.write_str("DISCONNECT"),
        }
    }
}
