use super::{CA_CERTIFICATE_TAG, CredentialError, CredentialKind, CredentialStore, load_broker_ca};
use crate::config::TlsSettings;

const CA_PEM: &[u8] = include_bytes!("../../certs/test/ca.pem");
const CA_DER: &[u8] = include_bytes!("../../certs/test/ca.der");
const OTHER_CA_PEM: &[u8] = include_bytes!("../../certs/test/other-ca.pem");
const CLIENT_KEY_PEM: &[u8] = include_bytes!("../../certs/test/client.key");

#[test]
fn test_register_der_ca() {
    let mut store = CredentialStore::new();
    store
        .register(CA_CERTIFICATE_TAG, CredentialKind::CaCertificate, CA_DER)
        .unwrap();

    let credential = store.get(CA_CERTIFICATE_TAG).unwrap();
    assert_eq!(credential.kind, CredentialKind::CaCertificate);
    assert_eq!(credential.der, CA_DER);
}

#[test]
fn test_ca_round_trip_by_tag() {
    let mut store = CredentialStore::new();
    store
        .register(7, CredentialKind::CaCertificate, OTHER_CA_PEM)
        .unwrap();

    let roots = store.root_store(&[7]).unwrap();
    assert_eq!(roots.len(), 1);
}

#[test]
fn test_same_material_in_pem_and_der_is_accepted_twice() {
    // ca.pem is the PEM encoding of ca.der
    let mut store = CredentialStore::new();
    store
        .register(1, CredentialKind::CaCertificate, CA_DER)
        .unwrap();
    store
        .register(1, CredentialKind::CaCertificate, CA_PEM)
        .unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn test_different_material_under_same_tag_is_rejected() {
    let mut store = CredentialStore::new();
    store
        .register(1, CredentialKind::CaCertificate, CA_PEM)
        .unwrap();

    let err = store
        .register(1, CredentialKind::CaCertificate, OTHER_CA_PEM)
        .unwrap_err();
    assert!(matches!(err, CredentialError::SlotOccupied { tag: 1 }));

    // the first entry is untouched
    assert_eq!(store.get(1).unwrap().der, CA_DER);
}

#[test]
fn test_malformed_certificate() {
    let mut store = CredentialStore::new();
    let err = store
        .register(3, CredentialKind::CaCertificate, b"definitely not DER")
        .unwrap_err();
    assert!(matches!(err, CredentialError::Malformed { tag: 3, .. }));
    assert!(store.is_empty());
}

#[test]
fn test_private_key_registration() {
    let mut store = CredentialStore::new();
    store
        .register(2, CredentialKind::PrivateKey, CLIENT_KEY_PEM)
        .unwrap();

    // DER form of the same key is recognised and matches the stored entry
    let der = store.get(2).unwrap().der.clone();
    store.register(2, CredentialKind::PrivateKey, &der).unwrap();

    let err = store
        .register(4, CredentialKind::PrivateKey, CA_PEM)
        .unwrap_err();
    assert!(matches!(err, CredentialError::Malformed { .. }));
}

#[test]
fn test_psk_registration() {
    let mut store = CredentialStore::new();
    store
        .register(9, CredentialKind::Psk, b"shared-secret")
        .unwrap();
    assert_eq!(store.psk(9).unwrap(), b"shared-secret");

    assert!(store.register(10, CredentialKind::Psk, b"").is_err());
}

#[test]
fn test_root_store_checks_tags_and_kinds() {
    let mut store = CredentialStore::new();
    store.register(9, CredentialKind::Psk, b"psk").unwrap();

    assert!(matches!(
        store.root_store(&[42]),
        Err(CredentialError::UnknownTag(42))
    ));
    assert!(matches!(
        store.root_store(&[9]),
        Err(CredentialError::WrongKind { tag: 9, .. })
    ));
}

#[test]
fn test_register_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ca.pem");
    std::fs::write(&path, CA_PEM).unwrap();

    let mut store = CredentialStore::new();
    store
        .register_file(1, CredentialKind::CaCertificate, &path)
        .unwrap();
    assert!(store.get(1).is_some());

    let missing = dir.path().join("missing.pem");
    assert!(matches!(
        store.register_file(2, CredentialKind::CaCertificate, &missing),
        Err(CredentialError::Io { .. })
    ));
}

#[test]
fn test_load_broker_ca_requires_a_path_when_verifying() {
    let mut store = CredentialStore::new();
    let err = load_broker_ca(&mut store, &TlsSettings::default()).unwrap_err();
    assert!(matches!(err, CredentialError::MissingCaCertificate));
    assert!(store.is_empty());

    let unverified = TlsSettings {
        verify_certificate_chain: false,
        ..TlsSettings::default()
    };
    load_broker_ca(&mut store, &unverified).unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_load_broker_ca_from_configured_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ca.pem");
    std::fs::write(&path, OTHER_CA_PEM).unwrap();

    let settings = TlsSettings {
        ca_certificate_path: Some(path.display().to_string()),
        ..TlsSettings::default()
    };
    let mut store = CredentialStore::new();
    load_broker_ca(&mut store, &settings).unwrap();
    assert_ne!(store.get(CA_CERTIFICATE_TAG).unwrap().der, CA_DER);
    assert!(store.root_store(&[CA_CERTIFICATE_TAG]).is_ok());

    let missing = TlsSettings {
        ca_certificate_path: Some(dir.path().join("absent.pem").display().to_string()),
        ..TlsSettings::default()
    };
    let err = load_broker_ca(&mut CredentialStore::new(), &missing).unwrap_err();
    assert!(matches!(err, CredentialError::Io { .. }));
}
