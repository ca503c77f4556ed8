//! In-memory broker and network fakes shared by the session and client tests.

use crate::protocol::{DISCONNECT, MAX_PACKET_SIZE};
use crate::session::{
    BrokerEndpoint, ConnectionManager, ConnectionOptions, MqttClientSession, PublishScheduler,
};
use crate::telemetry::FixedTemperature;
use crate::transport::{Connector, Resolver, Transport, TransportError};
use async_trait::async_trait;
use bytes::BytesMut;
use rumqttc::mqttbytes::{self, v4};
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const TOPIC: &str = "telemetry";

/// How the in-memory broker behaves for one connection.
#[derive(Debug, Clone, Copy)]
pub enum Broker {
    Accept { ack_publishes: bool },
    /// Never answers CONNECT.
    Silent,
    Refuse(u8),
    /// Accepts, then drops the link after the first PUBLISH.
    HangUpAfterPublish,
    /// Accepts, then answers the first PUBLISH with a DISCONNECT packet and
    /// keeps the link open.
    DisconnectAfterPublish,
    /// The TLS connection cannot be opened.
    Unreachable,
}

/// (message id, dup) of every PUBLISH the broker received.
pub type Published = mpsc::UnboundedReceiver<(u16, bool)>;

pub struct FakeConnector {
    script: Mutex<VecDeque<Broker>>,
    attempts: Arc<AtomicU32>,
    published: mpsc::UnboundedSender<(u16, bool)>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        _addr: SocketAddr,
        server_name: &str,
    ) -> Result<Transport, TransportError> {
        assert_eq!(server_name, "broker.test");
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let broker = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Broker::Unreachable);
        if let Broker::Unreachable = broker {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
        }
        let (client, server) = tokio::io::duplex(4096);
        tokio::spawn(serve(server, broker, self.published.clone()));
        Ok(Transport::new(client))
    }
}

async fn serve(
    mut link: DuplexStream,
    broker: Broker,
    published: mpsc::UnboundedSender<(u16, bool)>,
) {
    let mut buf = BytesMut::new();
    loop {
        let packet = loop {
            match v4::read(&mut buf, MAX_PACKET_SIZE) {
                Ok(packet) => break packet,
                Err(mqttbytes::Error::InsufficientBytes(_)) => {}
                Err(e) => panic!("client sent a malformed packet: {e:?}"),
            }
            match link.read_buf(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
        };
        match packet {
            v4::Packet::Connect(connect) => {
                assert_eq!(connect.login.unwrap().username, "device1@app1");
                match broker {
                    Broker::Silent => {}
                    Broker::Refuse(code) => {
                        link.write_all(&[0x20, 0x02, 0x00, code]).await.unwrap();
                    }
                    _ => link.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap(),
                }
            }
            v4::Packet::Publish(publish) => {
                assert_eq!(publish.topic, TOPIC);
                let _ = published.send((publish.pkid, publish.dup));
                match broker {
                    Broker::Accept {
                        ack_publishes: true,
                    } => {
                        let [hi, lo] = publish.pkid.to_be_bytes();
                        link.write_all(&[0x40, 0x02, hi, lo]).await.unwrap();
                    }
                    Broker::HangUpAfterPublish => return,
                    Broker::DisconnectAfterPublish => {
                        link.write_all(&DISCONNECT).await.unwrap();
                    }
                    _ => {}
                }
            }
            v4::Packet::Disconnect => return,
            _ => {}
        }
    }
}

/// Never answers the first `hangs` lookups, then fails the next `failures`.
pub struct FlakyResolver {
    hangs: AtomicU32,
    failures: AtomicU32,
    lookups: Arc<AtomicU32>,
}

#[async_trait]
impl Resolver for FlakyResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr, TransportError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let hangs = self.hangs.load(Ordering::SeqCst);
        if hangs > 0 {
            self.hangs.store(hangs - 1, Ordering::SeqCst);
            std::future::pending::<()>().await;
        }
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(TransportError::NoAddress {
                host: host.to_string(),
            });
        }
        Ok(SocketAddr::from(([127, 0, 0, 1], port)))
    }
}

pub struct Harness {
    pub manager: ConnectionManager<FlakyResolver, FakeConnector>,
    pub session: MqttClientSession,
    pub attempts: Arc<AtomicU32>,
    pub lookups: Arc<AtomicU32>,
    pub published: Published,
}

pub fn options() -> ConnectionOptions {
    ConnectionOptions {
        client_id: String::new(),
        username: "device1@app1".to_string(),
        password: "secret".to_string(),
        keep_alive_secs: 60,
        ack_timeout: Duration::from_secs(5),
        retry_delay: Duration::from_secs(60),
        resolve_retries: 3,
        resolve_timeout: Duration::from_secs(5),
        reset_budget_on_connect: true,
    }
}

pub fn harness(script: Vec<Broker>, lookup_failures: u32) -> Harness {
    harness_with(script, lookup_failures, 0, options())
}

pub fn harness_with(
    script: Vec<Broker>,
    lookup_failures: u32,
    lookup_hangs: u32,
    options: ConnectionOptions,
) -> Harness {
    let attempts = Arc::new(AtomicU32::new(0));
    let lookups = Arc::new(AtomicU32::new(0));
    let (tx, published) = mpsc::unbounded_channel();
    let connector = FakeConnector {
        script: Mutex::new(script.into()),
        attempts: attempts.clone(),
        published: tx,
    };
    let resolver = FlakyResolver {
        hangs: AtomicU32::new(lookup_hangs),
        failures: AtomicU32::new(lookup_failures),
        lookups: lookups.clone(),
    };
    Harness {
        manager: ConnectionManager::new(
            BrokerEndpoint::new("broker.test", 8883),
            options,
            resolver,
            connector,
        ),
        session: MqttClientSession::new(TOPIC, 5),
        attempts,
        lookups,
        published,
    }
}

pub fn scheduler() -> PublishScheduler<FixedTemperature> {
    PublishScheduler::new(
        FixedTemperature(42.0),
        Duration::from_secs(60),
        Duration::from_secs(5),
        64,
    )
}

pub fn drain(published: &mut Published) -> Vec<(u16, bool)> {
    let mut seen = Vec::new();
    while let Ok(entry) = published.try_recv() {
        seen.push(entry);
    }
    seen
}

pub fn assert_elapsed(started: Instant, secs: u64) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
        "expected {secs}s, took {elapsed:?}"
    );
}
