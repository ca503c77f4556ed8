//! The `error` module defines the crate-wide error type.
//!
//! Each subsystem reports failures with its own enum; `Error` aggregates them
//! so the connection loop can decide which failures count against the retry
//! budget and which ones must stop the process.

use std::time::Duration;

use thiserror::Error;

use crate::clock::TimeSyncError;
use crate::credentials::CredentialError;
use crate::protocol::ProtocolError;
use crate::telemetry::PayloadError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum Error {
    /// The clock could not be synchronised; fatal at startup.
    #[error("time synchronisation failed: {0}")]
    TimeSync(#[from] TimeSyncError),

    #[error("unable to resolve broker address for {host}")]
    Resolution {
        host: String,
        #[source]
        source: TransportError,
    },

    #[error("could not establish a TLS session with {host}")]
    Handshake {
        host: String,
        #[source]
        source: TransportError,
    },

    #[error("no CONNACK received within {0:?}")]
    AckTimeout(Duration),

    #[error("broker refused the connection (return code {0})")]
    ConnectRefused(u8),

    #[error("connection was not accepted after the first broker response")]
    NotConnected,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("invalid setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("gave up after {attempts} failed connection attempts")]
    RetriesExhausted { attempts: u32 },
}

impl Error {
    /// Errors that end a connection attempt but leave room for another one.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Resolution { .. }
                | Error::Handshake { .. }
                | Error::AckTimeout(_)
                | Error::ConnectRefused(_)
                | Error::NotConnected
                | Error::Protocol(_)
                | Error::Transport(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
