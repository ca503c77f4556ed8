//! The `transport` module is responsible for the byte stream between the
//! client and the broker.
//!
//! It provides:
//! - `Transport`, an unframed duplex stream with a bounded "wait for input"
//!   primitive used by both the connect handshake and the steady-state loop;
//! - the `Resolver` and `Connector` seams, with DNS and TLS implementations.
//!
//! Tests substitute in-memory streams for the TLS socket through `Connector`.

pub mod resolver;
pub mod tls;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

pub use resolver::{DnsResolver, Resolver};
pub use tls::TlsConnector;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("`{0}` is not a valid TLS server name")]
    InvalidServerName(String),
    #[error("{host} did not resolve to any address")]
    NoAddress { host: String },
    #[error("connection closed by peer")]
    Closed,
}

/// Any full-duplex byte stream the client can speak MQTT over.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Result of a bounded wait for inbound data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// This many bytes were appended to the inbound buffer.
    Ready(usize),
    /// Nothing arrived before the timeout.
    Idle,
    /// The peer closed the stream.
    Closed,
}

pub struct Transport {
    stream: Box<dyn Stream>,
    inbound: BytesMut,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("buffered", &self.inbound.len())
            .finish_non_exhaustive()
    }
}

impl Transport {
    pub fn new<S: Stream + 'static>(stream: S) -> Self {
        Self {
            stream: Box::new(stream),
            inbound: BytesMut::with_capacity(1024),
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        trace!(len = bytes.len(), "wrote to transport");
        Ok(())
    }

    /// Waits at most `timeout` for inbound bytes.
    ///
    /// Received bytes accumulate in [`Transport::inbound`] until decoded.
    pub async fn wait_for_input(&mut self, timeout: Duration) -> Result<Input, TransportError> {
        match tokio::time::timeout(timeout, self.stream.read_buf(&mut self.inbound)).await {
            Err(_) => Ok(Input::Idle),
            Ok(Ok(0)) => Ok(Input::Closed),
            Ok(Ok(n)) => {
                trace!(len = n, "read from transport");
                Ok(Input::Ready(n))
            }
            // TLS peers that drop the socket without close_notify
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(Input::Closed),
            Ok(Err(e)) => Err(TransportError::Io(e)),
        }
    }

    pub fn inbound(&mut self) -> &mut BytesMut {
        &mut self.inbound
    }

    /// Best-effort `bytes` write followed by a stream shutdown.
    pub async fn close_with(mut self, bytes: &[u8]) {
        if let Err(e) = self.send(bytes).await {
            debug!(error = %e, "could not send final packet");
        }
        self.close().await;
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "transport shutdown failed");
        }
    }
}

/// Opens a transport to the resolved broker address.
///
/// `server_name` is the broker hostname, used for SNI and peer name checks.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        addr: SocketAddr,
        server_name: &str,
    ) -> Result<Transport, TransportError>;
}

#[cfg(test)]
mod tests;
