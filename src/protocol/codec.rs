use bytes::BytesMut;
use rumqttc::QoS;
use rumqttc::mqttbytes::{
    self,
    v4::{self, Connect, Login, Packet, Publish},
};
use thiserror::Error;
use tracing::trace;

use super::event::ProtocolEvent;

/// Largest packet accepted from the broker.
pub const MAX_PACKET_SIZE: usize = 1024;

/// A complete MQTT 3.1.1 DISCONNECT packet.
pub const DISCONNECT: [u8; 2] = [0xE0, 0x00];

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("failed to encode {packet}: {source}")]
    Encode {
        packet: &'static str,
        #[source]
        source: mqttbytes::Error,
    },
    #[error("malformed packet from broker: {0}")]
    Decode(#[source] mqttbytes::Error),
    #[error("{field} is {len} bytes, limit is {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Fields of the CONNECT packet. The session is always clean.
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
    pub keep_alive: u16,
}

pub fn encode_connect(options: &ConnectOptions<'_>) -> Result<BytesMut, ProtocolError> {
    for (field, value) in [
        ("client id", options.client_id),
        ("username", options.username),
        ("password", options.password),
    ] {
        check_len(field, value.len(), usize::from(u16::MAX))?;
    }

    let mut connect = Connect::new(options.client_id);
    connect.keep_alive = options.keep_alive;
    connect.clean_session = true;
    connect.login = Some(Login::new(options.username, options.password));

    let mut buf = BytesMut::new();
    connect.write(&mut buf).map_err(|source| ProtocolError::Encode {
        packet: "CONNECT",
        source,
    })?;
    Ok(buf)
}

/// Encodes a QoS 1 PUBLISH. `dup` marks a retransmission of `message_id`.
pub fn encode_publish(
    topic: &str,
    message_id: u16,
    dup: bool,
    payload: &[u8],
) -> Result<BytesMut, ProtocolError> {
    check_len("topic", topic.len(), usize::from(u16::MAX))?;

    let mut publish = Publish::new(topic, QoS::AtLeastOnce, payload);
    publish.pkid = message_id;
    publish.dup = dup;

    let mut buf = BytesMut::new();
    publish.write(&mut buf).map_err(|source| ProtocolError::Encode {
        packet: "PUBLISH",
        source,
    })?;
    Ok(buf)
}

/// Takes one complete packet off the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched while the packet is still
/// incomplete.
pub fn decode(buf: &mut BytesMut) -> Result<Option<ProtocolEvent>, ProtocolError> {
    match v4::read(buf, MAX_PACKET_SIZE) {
        Ok(packet) => {
            let event = event_from(packet);
            trace!(event = %event, "decoded broker packet");
            Ok(Some(event))
        }
        Err(mqttbytes::Error::InsufficientBytes(_)) => Ok(None),
        Err(e) => Err(ProtocolError::Decode(e)),
    }
}

/// Decodes every complete packet in `buf`.
pub fn decode_all(buf: &mut BytesMut) -> Result<Vec<ProtocolEvent>, ProtocolError> {
    let mut events = Vec::new();
    while let Some(event) = decode(buf)? {
        events.push(event);
    }
    Ok(events)
}

fn event_from(packet: Packet) -> ProtocolEvent {
    match packet {
        Packet::ConnAck(ack) => ProtocolEvent::ConnectAck {
            session_present: ack.session_present,
            code: ack.code as u8,
        },
        // MQTT 3.1.1 PUBACK carries no reason code
        Packet::PubAck(ack) => ProtocolEvent::PublishAck {
            message_id: ack.pkid,
            code: 0,
        },
        Packet::SubAck(ack) => ProtocolEvent::SubscribeAck {
            message_id: ack.pkid,
        },
        Packet::UnsubAck(ack) => ProtocolEvent::UnsubscribeAck {
            message_id: ack.pkid,
        },
        Packet::Disconnect => ProtocolEvent::Disconnect,
        other => ProtocolEvent::Unknown {
            kind: packet_kind(&other),
        },
    }
}

fn packet_kind(packet: &Packet) -> String {
    let debug = format!("{packet:?}");
    debug
        .split(['(', ' ', '{'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), ProtocolError> {
    if len > max {
        return Err(ProtocolError::TooLong { field, len, max });
    }
    Ok(())
}
