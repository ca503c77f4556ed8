//! TLS transport to the broker.
//!
//! Certificate chain verification is on unless `tls.verify_certificate_chain`
//! is explicitly set to `false`. With verification off the peer certificate
//! must still name the broker host and sign the handshake; only the chain and
//! the validity period go unchecked.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::time_provider::TimeProvider;
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::{Connector, Transport, TransportError};
use crate::clock::ClockSource;
use crate::config::TlsSettings;
use crate::credentials::{CredentialStore, SecTag};
use crate::utils::error::Result;

#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    connect_timeout: Duration,
    verify_chain: bool,
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("connect_timeout", &self.connect_timeout)
            .field("verify_chain", &self.verify_chain)
            .finish_non_exhaustive()
    }
}

impl TlsConnector {
    /// Builds a connector trusting the CA certificates stored under `ca_tags`.
    ///
    /// `clock` supplies the time used for certificate validity checks.
    pub fn new(
        settings: &TlsSettings,
        credentials: &CredentialStore,
        ca_tags: &[SecTag],
        clock: Arc<ClockSource>,
    ) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let time: Arc<dyn TimeProvider> = if settings.verify_certificate_chain {
            clock
        } else {
            Arc::new(UptimeFallback(clock))
        };
        let builder = ClientConfig::builder_with_details(provider.clone(), time)
            .with_safe_default_protocol_versions()
            .map_err(TransportError::from)?;

        let mut config = if settings.verify_certificate_chain {
            let roots = credentials.root_store(ca_tags)?;
            builder.with_root_certificates(roots).with_no_client_auth()
        } else {
            warn!("TLS certificate chain verification is disabled; only the peer name is checked");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(PeerNameVerifier::new(provider)))
                .with_no_client_auth()
        };
        config.alpn_protocols = settings
            .alpn_protocols
            .iter()
            .map(|p| p.as_bytes().to_vec())
            .collect();

        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(config)),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            verify_chain: settings.verify_certificate_chain,
        })
    }

    pub fn verifies_chain(&self) -> bool {
        self.verify_chain
    }
}

#[async_trait]
impl Connector for TlsConnector {
    async fn connect(
        &self,
        addr: SocketAddr,
        server_name: &str,
    ) -> Result<Transport, TransportError> {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TransportError::InvalidServerName(server_name.to_string()))?;

        if !self.verify_chain {
            warn!(%server_name, "connecting without certificate chain verification");
        }

        let tcp = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))??;
        tcp.set_nodelay(true)?;

        let tls = tokio::time::timeout(self.connect_timeout, self.inner.connect(name, tcp))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))??;
        debug!(%addr, %server_name, "TLS session established");

        Ok(Transport::new(tls))
    }
}

/// Without chain verification an unsynchronised clock is tolerated and reads
/// as uptime since the epoch.
#[derive(Debug)]
struct UptimeFallback(Arc<ClockSource>);

impl TimeProvider for UptimeFallback {
    fn current_time(&self) -> Option<UnixTime> {
        self.0.current_time().or_else(|| {
            let secs = u64::try_from(self.0.now()).unwrap_or(0);
            Some(UnixTime::since_unix_epoch(Duration::from_secs(secs)))
        })
    }
}

/// Accepts any chain, but still requires the end-entity certificate to be
/// valid for the server name and the handshake signatures to verify.
#[derive(Debug)]
pub struct PeerNameVerifier {
    provider: Arc<CryptoProvider>,
}

impl PeerNameVerifier {
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for PeerNameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        rustls::client::verify_server_name(&cert, server_name)?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
