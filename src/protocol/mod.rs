//! The `protocol` module translates between MQTT 3.1.1 packets and the
//! events the session reacts to.
//!
//! Packet encoding and parsing is delegated to `rumqttc`'s `mqttbytes`
//! codec; this module only decides which packets the client sends and how
//! broker packets map onto [`ProtocolEvent`].

pub mod codec;
pub mod event;

pub use codec::{ConnectOptions, DISCONNECT, MAX_PACKET_SIZE, ProtocolError};
pub use event::{CONNECTION_ACCEPTED, ProtocolEvent};
