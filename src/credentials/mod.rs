//! The `credentials` module holds the certificate and key material used by
//! the TLS layer.
//!
//! Material is registered once under an integer tag and referenced by that
//! tag from the TLS configuration. The broker CA certificate is provisioned with
//! the deployment, named by `tls.ca_certificate_path`, and registered under
//! [`CA_CERTIFICATE_TAG`] at startup.

pub mod store;

use std::path::Path;

use tracing::{info, warn};

use crate::config::TlsSettings;

pub use store::{Credential, CredentialError, CredentialKind, CredentialStore, SecTag};

/// Tag of the broker CA certificate.
pub const CA_CERTIFICATE_TAG: SecTag = 1;

/// Registers the broker CA named in `tls.ca_certificate_path`.
///
/// A CA is required while chain verification is on. Without verification
/// nothing is registered when no path is configured.
pub fn load_broker_ca(
    store: &mut CredentialStore,
    settings: &TlsSettings,
) -> Result<(), CredentialError> {
    match settings.ca_certificate_path.as_deref() {
        Some(path) => {
            info!(path, "loading broker CA certificate");
            store.register_file(
                CA_CERTIFICATE_TAG,
                CredentialKind::CaCertificate,
                Path::new(path),
            )
        }
        None if settings.verify_certificate_chain => Err(CredentialError::MissingCaCertificate),
        None => {
            warn!("no broker CA configured; chain verification is disabled");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
