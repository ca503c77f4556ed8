use super::{Connector, DnsResolver, Input, Resolver, TlsConnector, Transport, TransportError};
use crate::clock::ClockSource;
use crate::config::TlsSettings;
use crate::credentials::{CredentialKind, CredentialStore};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const CA_PEM: &[u8] = include_bytes!("../../certs/test/ca.pem");
const OTHER_CA_PEM: &[u8] = include_bytes!("../../certs/test/other-ca.pem");
const SERVER_PEM: &[u8] = include_bytes!("../../certs/test/server.pem");
const SERVER_KEY: &[u8] = include_bytes!("../../certs/test/server.key");

/// 2030-01-01T00:00:00Z, inside the test server certificate's validity window.
const TEST_EPOCH: i64 = 1_893_456_000;

async fn spawn_tls_server() -> SocketAddr {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &SERVER_PEM[..])
        .collect::<Result<_, _>>()
        .unwrap();
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut &SERVER_KEY[..])
        .unwrap()
        .unwrap();
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        if let Ok(mut tls) = acceptor.accept(tcp).await {
            let mut buf = [0u8; 4];
            if tls.read_exact(&mut buf).await.is_ok() && &buf == b"ping" {
                let _ = tls.write_all(b"pong").await;
                let _ = tls.flush().await;
            }
            // keep the session open until the client goes away
            let _ = tls.read(&mut buf).await;
        }
    });
    addr
}

fn connector(verify: bool, ca: &[u8], clock: Arc<ClockSource>) -> TlsConnector {
    let mut store = CredentialStore::new();
    store.register(1, CredentialKind::CaCertificate, ca).unwrap();
    let settings = TlsSettings {
        verify_certificate_chain: verify,
        connect_timeout_secs: 5,
        ..TlsSettings::default()
    };
    TlsConnector::new(&settings, &store, &[1], clock).unwrap()
}

fn synced_clock() -> Arc<ClockSource> {
    let clock = Arc::new(ClockSource::new());
    clock.record_offset(TEST_EPOCH);
    clock
}

#[tokio::test]
async fn test_transport_over_duplex() {
    let (client, mut broker) = tokio::io::duplex(256);
    let mut transport = Transport::new(client);

    transport.send(b"hello").await.unwrap();
    let mut buf = [0u8; 5];
    broker.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"hello");

    broker.write_all(b"abc").await.unwrap();
    assert_eq!(
        transport.wait_for_input(Duration::from_secs(1)).await.unwrap(),
        Input::Ready(3)
    );
    assert_eq!(&transport.inbound()[..], b"abc");

    drop(broker);
    assert_eq!(
        transport.wait_for_input(Duration::from_secs(1)).await.unwrap(),
        Input::Closed
    );
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_input_times_out() {
    let (client, _broker) = tokio::io::duplex(256);
    let mut transport = Transport::new(client);

    let started = tokio::time::Instant::now();
    assert_eq!(
        transport.wait_for_input(Duration::from_secs(5)).await.unwrap(),
        Input::Idle
    );
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_dns_resolver_resolves_localhost() {
    let addr = DnsResolver.resolve("localhost", 8883).await.unwrap();
    assert!(addr.ip().is_loopback());
    assert_eq!(addr.port(), 8883);
}

#[tokio::test]
async fn test_tls_handshake_with_chain_verification() {
    let addr = spawn_tls_server().await;
    let connector = connector(true, CA_PEM, synced_clock());
    assert!(connector.verifies_chain());

    let mut transport = connector.connect(addr, "localhost").await.unwrap();
    transport.send(b"ping").await.unwrap();
    let input = transport
        .wait_for_input(Duration::from_secs(5))
        .await
        .unwrap();
    assert!(matches!(input, Input::Ready(_)));
    assert_eq!(&transport.inbound()[..], b"pong");
}

#[tokio::test]
async fn test_tls_handshake_fails_without_synchronised_clock() {
    let addr = spawn_tls_server().await;
    let connector = connector(true, CA_PEM, Arc::new(ClockSource::new()));

    assert!(connector.connect(addr, "localhost").await.is_err());
}

#[tokio::test]
async fn test_tls_handshake_fails_with_untrusted_ca() {
    let addr = spawn_tls_server().await;
    let connector = connector(true, OTHER_CA_PEM, synced_clock());

    assert!(connector.connect(addr, "localhost").await.is_err());
}

#[tokio::test]
async fn test_unverified_chain_still_checks_peer_name() {
    let addr = spawn_tls_server().await;
    let connector = connector(false, OTHER_CA_PEM, Arc::new(ClockSource::new()));
    assert!(!connector.verifies_chain());
    assert!(connector.connect(addr, "localhost").await.is_ok());

    let addr = spawn_tls_server().await;
    assert!(connector.connect(addr, "broker.example.com").await.is_err());
}

#[tokio::test]
async fn test_invalid_server_name() {
    let connector = connector(true, CA_PEM, synced_clock());
    let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();

    let err = connector.connect(addr, "not a hostname").await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidServerName(_)));
}
