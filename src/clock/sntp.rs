//! Minimal SNTP (RFC 4330) query used once at startup.
//!
//! Only the server's transmit timestamp is used; round-trip delay is ignored
//! since certificate validity checks only need second-level accuracy.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::{UdpSocket, lookup_host};
use tracing::{debug, info};

const NTP_PACKET_LEN: usize = 48;
/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01.
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;
/// LI = 0, VN = 3, Mode = 3 (client).
const CLIENT_REQUEST_HEADER: u8 = 0x1B;
const MODE_SERVER: u8 = 4;
const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

#[derive(Error, Debug)]
pub enum TimeSyncError {
    #[error("SNTP exchange with {server} failed: {source}")]
    Io {
        server: String,
        #[source]
        source: io::Error,
    },
    #[error("{server} did not resolve to any address")]
    NoAddress { server: String },
    #[error("no SNTP response from {server} within {timeout:?}")]
    Timeout { server: String, timeout: Duration },
    #[error("malformed SNTP response: {0}")]
    Malformed(&'static str),
}

/// A source of the current epoch time, queried once before connecting.
#[async_trait]
pub trait TimeSync: Send + Sync {
    async fn epoch_seconds(&self) -> Result<i64, TimeSyncError>;
}

#[derive(Debug, Clone)]
pub struct SntpClient {
    server: String,
    timeout: Duration,
}

impl SntpClient {
    /// `server` is a `host:port` pair, e.g. `time.google.com:123`.
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            timeout,
        }
    }

    async fn exchange(&self) -> Result<Vec<u8>, TimeSyncError> {
        let io_err = |source| TimeSyncError::Io {
            server: self.server.clone(),
            source,
        };

        let addr = lookup_host(self.server.as_str())
            .await
            .map_err(io_err)?
            .next()
            .ok_or_else(|| TimeSyncError::NoAddress {
                server: self.server.clone(),
            })?;

        let bind_addr: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await.map_err(io_err)?;
        socket.connect(addr).await.map_err(io_err)?;

        let mut request = [0u8; NTP_PACKET_LEN];
        request[0] = CLIENT_REQUEST_HEADER;
        socket.send(&request).await.map_err(io_err)?;
        debug!(server = %self.server, %addr, "SNTP request sent");

        let mut response = vec![0u8; 512];
        let len = socket.recv(&mut response).await.map_err(io_err)?;
        response.truncate(len);
        Ok(response)
    }
}

#[async_trait]
impl TimeSync for SntpClient {
    async fn epoch_seconds(&self) -> Result<i64, TimeSyncError> {
        info!(server = %self.server, "sending SNTP request for current time");
        let response = tokio::time::timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| TimeSyncError::Timeout {
                server: self.server.clone(),
                timeout: self.timeout,
            })??;
        parse_response(&response)
    }
}

/// Extracts the transmit timestamp from a server response as UNIX seconds.
pub fn parse_response(packet: &[u8]) -> Result<i64, TimeSyncError> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(TimeSyncError::Malformed("short packet"));
    }
    if packet[0] & 0x07 != MODE_SERVER {
        return Err(TimeSyncError::Malformed("not a server response"));
    }
    // stratum 0 is a kiss-of-death packet
    if packet[1] == 0 {
        return Err(TimeSyncError::Malformed("kiss-of-death"));
    }

    let ts = &packet[TRANSMIT_TIMESTAMP_OFFSET..TRANSMIT_TIMESTAMP_OFFSET + 4];
    let seconds = u32::from_be_bytes([ts[0], ts[1], ts[2], ts[3]]);
    if seconds == 0 {
        return Err(TimeSyncError::Malformed("empty transmit timestamp"));
    }
    Ok(i64::from(seconds) - NTP_UNIX_OFFSET)
}
