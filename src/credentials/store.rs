//! Tag-addressed credential storage.
//!
//! Every entry is validated for its kind when registered and stored in DER
//! form, so PEM and DER encodings of the same certificate are the same
//! credential.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{
    CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer, PrivatePkcs8KeyDer, PrivateSec1KeyDer,
};
use thiserror::Error;
use tracing::{debug, info};

pub type SecTag = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    CaCertificate,
    PrivateKey,
    Psk,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub tag: SecTag,
    pub kind: CredentialKind,
    pub der: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("credential slot {tag} already holds different material")]
    SlotOccupied { tag: SecTag },
    #[error("{kind:?} material for tag {tag} is malformed: {reason}")]
    Malformed {
        tag: SecTag,
        kind: CredentialKind,
        reason: String,
    },
    #[error("no credential registered under tag {0}")]
    UnknownTag(SecTag),
    #[error("credential {tag} is {actual:?}, expected {expected:?}")]
    WrongKind {
        tag: SecTag,
        expected: CredentialKind,
        actual: CredentialKind,
    },
    #[error("chain verification needs a broker CA; set tls.ca_certificate_path")]
    MissingCaCertificate,
    #[error("failed to read credential file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct CredentialStore {
    slots: BTreeMap<SecTag, Credential>,
    provider: Arc<CryptoProvider>,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::with_provider(Arc::new(rustls::crypto::ring::default_provider()))
    }

    /// The provider is used to check that private keys can actually be loaded.
    pub fn with_provider(provider: Arc<CryptoProvider>) -> Self {
        Self {
            slots: BTreeMap::new(),
            provider,
        }
    }

    pub fn register(
        &mut self,
        tag: SecTag,
        kind: CredentialKind,
        bytes: &[u8],
    ) -> Result<(), CredentialError> {
        let der = self.normalize(tag, kind, bytes)?;

        match self.slots.get(&tag) {
            Some(existing) if existing.kind == kind && existing.der == der => {
                debug!(tag, ?kind, "credential already registered");
                Ok(())
            }
            Some(_) => Err(CredentialError::SlotOccupied { tag }),
            None => {
                info!(tag, ?kind, len = der.len(), "credential registered");
                self.slots.insert(tag, Credential { tag, kind, der });
                Ok(())
            }
        }
    }

    /// Reads `path` and registers its contents.
    pub fn register_file(
        &mut self,
        tag: SecTag,
        kind: CredentialKind,
        path: &Path,
    ) -> Result<(), CredentialError> {
        let bytes = std::fs::read(path).map_err(|source| CredentialError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.register(tag, kind, &bytes)
    }

    pub fn get(&self, tag: SecTag) -> Option<&Credential> {
        self.slots.get(&tag)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Builds a trust store from the CA certificates registered under `tags`.
    pub fn root_store(&self, tags: &[SecTag]) -> Result<RootCertStore, CredentialError> {
        let mut roots = RootCertStore::empty();
        for &tag in tags {
            let credential = self.expect_kind(tag, CredentialKind::CaCertificate)?;
            roots
                .add(CertificateDer::from(credential.der.clone()))
                .map_err(|e| malformed(tag, CredentialKind::CaCertificate, e))?;
        }
        Ok(roots)
    }

    /// Returns the pre-shared key stored under `tag`.
    pub fn psk(&self, tag: SecTag) -> Result<&[u8], CredentialError> {
        Ok(&self.expect_kind(tag, CredentialKind::Psk)?.der)
    }

    fn expect_kind(
        &self,
        tag: SecTag,
        expected: CredentialKind,
    ) -> Result<&Credential, CredentialError> {
        let credential = self.get(tag).ok_or(CredentialError::UnknownTag(tag))?;
        if credential.kind != expected {
            return Err(CredentialError::WrongKind {
                tag,
                expected,
                actual: credential.kind,
            });
        }
        Ok(credential)
    }

    fn normalize(
        &self,
        tag: SecTag,
        kind: CredentialKind,
        bytes: &[u8],
    ) -> Result<Vec<u8>, CredentialError> {
        match kind {
            CredentialKind::CaCertificate => {
                let der = if is_pem(bytes) {
                    let mut certs = rustls_pemfile::certs(&mut &bytes[..])
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| malformed(tag, kind, e))?;
                    if certs.len() != 1 {
                        return Err(malformed(
                            tag,
                            kind,
                            format!("expected one certificate, found {}", certs.len()),
                        ));
                    }
                    certs.remove(0).to_vec()
                } else {
                    bytes.to_vec()
                };

                RootCertStore::empty()
                    .add(CertificateDer::from(der.clone()))
                    .map_err(|e| malformed(tag, kind, e))?;
                Ok(der)
            }
            CredentialKind::PrivateKey => {
                let key = if is_pem(bytes) {
                    rustls_pemfile::private_key(&mut &bytes[..])
                        .map_err(|e| malformed(tag, kind, e))?
                        .ok_or_else(|| malformed(tag, kind, "no private key in PEM input"))?
                } else {
                    self.detect_der_key(bytes)
                        .ok_or_else(|| malformed(tag, kind, "unrecognised key encoding"))?
                };

                let der = key.secret_der().to_vec();
                self.provider
                    .key_provider
                    .load_private_key(key)
                    .map_err(|e| malformed(tag, kind, e))?;
                Ok(der)
            }
            CredentialKind::Psk => {
                if bytes.is_empty() {
                    return Err(malformed(tag, kind, "empty pre-shared key"));
                }
                Ok(bytes.to_vec())
            }
        }
    }

    fn detect_der_key(&self, bytes: &[u8]) -> Option<PrivateKeyDer<'static>> {
        let candidates = [
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(bytes.to_vec())),
            PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(bytes.to_vec())),
            PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(bytes.to_vec())),
        ];
        candidates
            .into_iter()
            .find(|key| self.provider.key_provider.load_private_key(key.clone_key()).is_ok())
    }
}

fn is_pem(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .is_some_and(|start| bytes[start..].starts_with(b"-----BEGIN"))
}

fn malformed(tag: SecTag, kind: CredentialKind, reason: impl ToString) -> CredentialError {
    CredentialError::Malformed {
        tag,
        kind,
        reason: reason.to_string(),
    }
}
