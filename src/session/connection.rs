//! Connection establishment with bounded retries.
//!
//! One attempt walks `Resolving → Connecting → AwaitingAck → Connected`.
//! Any recoverable failure closes the transport, costs one unit of the retry
//! budget and is followed by `retry_delay` of sleep, unless the budget is
//! spent, in which case the session stays `Disconnected` for good.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::handler::{self, Outcome};
use super::state::{ConnectionState, MqttClientSession};
use crate::config::Settings;
use crate::protocol::{ConnectOptions, ProtocolEvent, codec};
use crate::transport::{Connector, Input, Resolver, Transport, TransportError};
use crate::utils::error::{Error, Result};

/// The broker address. Resolved again on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub hostname: String,
    pub port: u16,
    pub resolved_address: Option<SocketAddr>,
}

impl BrokerEndpoint {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            resolved_address: None,
        }
    }
}

/// CONNECT contents and the timing of the connect sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive_secs: u16,
    pub ack_timeout: Duration,
    pub retry_delay: Duration,
    /// Extra lookups after the first failed one.
    pub resolve_retries: u32,
    /// Bound on each lookup.
    pub resolve_timeout: Duration,
    pub reset_budget_on_connect: bool,
}

impl ConnectionOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let keep_alive_secs =
            u16::try_from(settings.session.keep_alive_secs).map_err(|_| Error::InvalidSetting {
                field: "session.keep_alive_secs",
                reason: "must fit in 16 bits".to_string(),
            })?;
        Ok(Self {
            client_id: settings.broker.client_id.clone(),
            username: settings.username(),
            password: settings.device.password.clone(),
            keep_alive_secs,
            ack_timeout: settings.session.ack_timeout(),
            retry_delay: settings.session.retry_delay(),
            resolve_retries: settings.session.resolve_retries,
            resolve_timeout: settings.session.resolve_timeout(),
            reset_budget_on_connect: settings.session.reset_budget_on_connect,
        })
    }
}

pub struct ConnectionManager<R, C> {
    endpoint: BrokerEndpoint,
    options: ConnectionOptions,
    resolver: R,
    connector: C,
}

impl<R, C> std::fmt::Debug for ConnectionManager<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("client_id", &self.options.client_id)
            .field("username", &self.options.username)
            .finish_non_exhaustive()
    }
}

impl<R: Resolver, C: Connector> ConnectionManager<R, C> {
    pub fn new(
        endpoint: BrokerEndpoint,
        options: ConnectionOptions,
        resolver: R,
        connector: C,
    ) -> Self {
        Self {
            endpoint,
            options,
            resolver,
            connector,
        }
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Connects, retrying until the broker accepts or the budget runs out.
    ///
    /// On success the session is `Connected`, its retry budget is restored and
    /// the returned transport is ready for publishing. Errors other than
    /// `RetriesExhausted` are failures no retry can fix.
    pub async fn connect(&mut self, session: &mut MqttClientSession) -> Result<Transport> {
        if session.retry.is_exhausted() {
            session.set_state(ConnectionState::Disconnected);
            return Err(Error::RetriesExhausted {
                attempts: session.retry.initial(),
            });
        }

        loop {
            match self.attempt(session).await {
                Ok(transport) => {
                    if self.options.reset_budget_on_connect {
                        session.retry.reset();
                    }
                    return Ok(transport);
                }
                Err(e) if e.is_recoverable() => {
                    session.set_state(ConnectionState::Disconnected);
                    let remaining = session.retry.consume();
                    if remaining == 0 {
                        error!(
                            error = %e,
                            attempts = session.retry.initial(),
                            "connection attempt failed, retry budget exhausted"
                        );
                        return Err(Error::RetriesExhausted {
                            attempts: session.retry.initial(),
                        });
                    }
                    warn!(
                        error = %e,
                        remaining,
                        delay = ?self.options.retry_delay,
                        "connection attempt failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(e) => {
                    session.set_state(ConnectionState::Disconnected);
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&mut self, session: &mut MqttClientSession) -> Result<Transport> {
        session.set_state(ConnectionState::Resolving);
        let addr = self.resolve().await?;

        session.set_state(ConnectionState::Connecting);
        let mut transport = self
            .connector
            .connect(addr, &self.endpoint.hostname)
            .await
            .map_err(|source| Error::Handshake {
                host: self.endpoint.hostname.clone(),
                source,
            })?;

        let connect = codec::encode_connect(&ConnectOptions {
            client_id: &self.options.client_id,
            username: &self.options.username,
            password: &self.options.password,
            keep_alive: self.options.keep_alive_secs,
        });
        let sent = match connect {
            Ok(packet) => transport.send(&packet).await.map_err(Error::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = sent {
            transport.close().await;
            return Err(e);
        }
        session.set_state(ConnectionState::AwaitingAck);

        match self.await_ack(session, &mut transport).await {
            Ok(()) => {
                info!(
                    host = %self.endpoint.hostname,
                    %addr,
                    "MQTT session established"
                );
                Ok(transport)
            }
            Err(e) => {
                transport.close().await;
                Err(e)
            }
        }
    }

    async fn resolve(&mut self) -> Result<SocketAddr> {
        self.endpoint.resolved_address = None;
        let host = self.endpoint.hostname.clone();
        let mut last_error = None;

        let timeout = self.options.resolve_timeout;
        for lookup in 0..=self.options.resolve_retries {
            let result =
                tokio::time::timeout(timeout, self.resolver.resolve(&host, self.endpoint.port))
                    .await
                    .unwrap_or(Err(TransportError::Timeout(timeout)));
            match result {
                Ok(addr) => {
                    debug!(%host, %addr, "broker address resolved");
                    self.endpoint.resolved_address = Some(addr);
                    return Ok(addr);
                }
                Err(e) => {
                    debug!(%host, lookup, error = %e, "lookup failed");
                    last_error = Some(e);
                }
            }
        }

        let source = last_error.unwrap_or(TransportError::NoAddress { host: host.clone() });
        Err(Error::Resolution { host, source })
    }

    /// Reads one batch of broker input and requires it to complete the
    /// connect handshake.
    async fn await_ack(
        &self,
        session: &mut MqttClientSession,
        transport: &mut Transport,
    ) -> Result<()> {
        match transport.wait_for_input(self.options.ack_timeout).await? {
            Input::Idle => return Err(Error::AckTimeout(self.options.ack_timeout)),
            Input::Closed => {
                handler::handle(session, &ProtocolEvent::Disconnect);
                return Err(TransportError::Closed.into());
            }
            Input::Ready(_) => {}
        }

        for event in codec::decode_all(transport.inbound())? {
            match handler::handle(session, &event) {
                Outcome::ConnectRefused(code) => return Err(Error::ConnectRefused(code)),
                Outcome::Disconnected => return Err(TransportError::Closed.into()),
                _ => {}
            }
        }

        if session.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}
