use tracing::{info, warn};

use crate::config::Settings;
use crate::protocol::DISCONNECT;
use crate::session::{
    BrokerEndpoint, ConnectionManager, ConnectionOptions, MqttClientSession, PublishScheduler,
    SchedulerExit,
};
use crate::telemetry::{FixedTemperature, TelemetrySource};
use crate::transport::{Connector, DnsResolver, Resolver, TlsConnector, Transport};
use crate::utils::error::Result;

pub struct Client<R, C, S> {
    connection: ConnectionManager<R, C>,
    scheduler: PublishScheduler<S>,
    session: MqttClientSession,
    transport: Option<Transport>,
}

impl<R, C, S> std::fmt::Debug for Client<R, C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connection", &self.connection)
            .field("session", &self.session)
            .field("connected", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl Client<DnsResolver, TlsConnector, FixedTemperature> {
    /// The production client: system DNS, TLS to the configured broker and
    /// the configured fixed temperature reading.
    pub fn from_settings(settings: &Settings, connector: TlsConnector) -> Result<Self> {
        let connection = ConnectionManager::new(
            BrokerEndpoint::new(settings.broker.hostname.clone(), settings.broker.port),
            ConnectionOptions::from_settings(settings)?,
            DnsResolver,
            connector,
        );
        let scheduler = PublishScheduler::from_settings(
            FixedTemperature(settings.telemetry.temperature),
            settings,
        );
        let session = MqttClientSession::new(
            settings.telemetry.topic.clone(),
            settings.session.retry_budget,
        );
        Ok(Self::new(connection, scheduler, session))
    }
}

impl<R, C, S> Client<R, C, S>
where
    R: Resolver,
    C: Connector,
    S: TelemetrySource,
{
    pub fn new(
        connection: ConnectionManager<R, C>,
        scheduler: PublishScheduler<S>,
        session: MqttClientSession,
    ) -> Self {
        Self {
            connection,
            scheduler,
            session,
            transport: None,
        }
    }

    pub fn session(&self) -> &MqttClientSession {
        &self.session
    }

    pub fn connection(&self) -> &ConnectionManager<R, C> {
        &self.connection
    }

    /// Connects and publishes, reconnecting whenever the connection drops.
    ///
    /// Only returns once reconnecting is impossible, normally with
    /// `Error::RetriesExhausted`.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let exit = self.run_connection(None).await?;
            self.drop_connection(&exit).await;
        }
    }

    /// Connects if needed and runs `cycles` publish cycles on the connection.
    ///
    /// Returns early if the connection drops; the next call reconnects.
    pub async fn run_cycles(&mut self, cycles: u32) -> Result<SchedulerExit> {
        let exit = self.run_connection(Some(cycles)).await?;
        if !matches!(exit, SchedulerExit::CyclesCompleted) {
            self.drop_connection(&exit).await;
        }
        Ok(exit)
    }

    /// Sends DISCONNECT on a live connection and closes it.
    pub async fn shutdown(&mut self) {
        if let Some(transport) = self.transport.take() {
            info!("disconnecting from broker");
            transport.close_with(&DISCONNECT).await;
        }
        self.session.disconnect();
    }

    async fn run_connection(&mut self, cycles: Option<u32>) -> Result<SchedulerExit> {
        let mut transport = match self.transport.take() {
            Some(transport) if self.session.is_connected() => transport,
            stale => {
                if let Some(transport) = stale {
                    transport.close().await;
                }
                self.session.disconnect();
                self.connection.connect(&mut self.session).await?
            }
        };

        let result = match cycles {
            Some(n) => {
                self.scheduler
                    .run_cycles(&mut self.session, &mut transport, n)
                    .await
            }
            None => self.scheduler.run(&mut self.session, &mut transport).await,
        };
        self.transport = Some(transport);
        result
    }

    async fn drop_connection(&mut self, exit: &SchedulerExit) {
        match exit {
            SchedulerExit::TransportFailed(e) => warn!(error = %e, "connection lost"),
            SchedulerExit::Disconnected => warn!("broker ended the session"),
            SchedulerExit::CyclesCompleted => {}
        }
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.session.disconnect();
    }
}
