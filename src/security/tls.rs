// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Mutual-TLS client configuration for KMIP connections.
//!
//! Certificates and keys are supplied as PEM bytes. The client offers
//! TLS 1.2 and 1.3 only, restricted to ECDHE/AEAD suites for TLS 1.2.

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{CipherSuite, ClientConfig, RootCertStore, SupportedCipherSuite};
use tokio_rustls::TlsConnector;

use super::error::SecurityError;

const ENCRYPTED_PRIVATE_KEY_TAG: &str = "ENCRYPTED PRIVATE KEY";

/// TLS 1.2 cipher suites a KMIP connection may negotiate.
pub const KMIP_TLS12_CIPHER_SUITES: &[CipherSuite] = &[
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
];

/// PEM material for a mutually authenticated client connection.
#[derive(Clone)]
pub struct TlsConfig {
    /// Client certificate chain (PEM).
    pub client_certificate: Vec<u8>,
    /// Client private key (PEM), possibly an encrypted PKCS#8 key.
    pub client_private_key: Vec<u8>,
    /// Password for an encrypted client private key.
    pub client_key_password: Option<String>,
    /// Root CA used to verify the server (PEM).
    pub root_certificate: Vec<u8>,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("client_certificate_len", &self.client_certificate.len())
            .field("client_private_key", &"[REDACTED]")
            .field("root_certificate_len", &self.root_certificate.len())
            .finish()
    }
}

/// Returns the aws-lc-rs provider restricted to the KMIP cipher suites.
///
/// TLS 1.3 suites are all AEAD and are kept as-is.
pub fn kmip_crypto_provider() -> CryptoProvider {
    let mut provider = rustls::crypto::aws_lc_rs::default_provider();
    provider.cipher_suites.retain(|suite| {
        matches!(suite, SupportedCipherSuite::Tls13(_))
            || KMIP_TLS12_CIPHER_SUITES.contains(&suite.suite())
    });
    provider
}

/// Builds the rustls client configuration for a KMIP server.
///
/// Fails before any network I/O if the certificate, key or root CA
/// cannot be parsed.
pub fn create_client_config(config: &TlsConfig) -> Result<ClientConfig, SecurityError> {
    let roots = load_root_certs(&config.root_certificate, "root certificate")?;
    let certs = load_certs(&config.client_certificate, "client certificate")?;
    let key = load_private_key(
        &config.client_private_key,
        "client private key",
        config.client_key_password.as_deref(),
    )?;

    let client_config = ClientConfig::builder_with_provider(Arc::new(kmip_crypto_provider()))
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)?;

    Ok(client_config)
}

/// Creates a TLS connector for KMIP client connections.
pub fn create_tls_connector(config: &TlsConfig) -> Result<TlsConnector, SecurityError> {
    Ok(TlsConnector::from(Arc::new(create_client_config(config)?)))
}

/// Loads certificates from PEM bytes.
pub fn load_certs(
    pem: &[u8],
    source_name: &str,
) -> Result<Vec<CertificateDer<'static>>, SecurityError> {
    let mut reader = pem;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SecurityError::CertificateLoad {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })?;

    if certs.is_empty() {
        return Err(SecurityError::CertificateLoad {
            source_name: source_name.to_string(),
            reason: "no certificates found".into(),
        });
    }

    Ok(certs)
}

/// Returns true if the PEM bytes hold an encrypted PKCS#8 private key.
pub fn is_encrypted_private_key(pem: &[u8]) -> bool {
    pem::parse_many(pem)
        .map(|blocks| blocks.iter().any(|b| b.tag() == ENCRYPTED_PRIVATE_KEY_TAG))
        .unwrap_or(false)
}

/// Loads a private key from PEM bytes.
///
/// Plain PKCS#1, PKCS#8 and SEC1 keys are read directly; an encrypted
/// PKCS#8 key (PBES2) is decrypted with `password`.
pub fn load_private_key(
    pem: &[u8],
    source_name: &str,
    password: Option<&str>,
) -> Result<PrivateKeyDer<'static>, SecurityError> {
    let mut reader = pem;

    loop {
        match rustls_pemfile::read_one(&mut reader).map_err(|e| SecurityError::PrivateKeyLoad {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })? {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => {
                return Ok(PrivateKeyDer::Pkcs1(key));
            }
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => {
                return Ok(PrivateKeyDer::Pkcs8(key));
            }
            Some(rustls_pemfile::Item::Sec1Key(key)) => {
                return Ok(PrivateKeyDer::Sec1(key));
            }
            None => break,
            _ => continue,
        }
    }

    if is_encrypted_private_key(pem) {
        return decrypt_private_key(pem, source_name, password);
    }

    Err(SecurityError::PrivateKeyLoad {
        source_name: source_name.to_string(),
        reason: "no private key found".into(),
    })
}

fn decrypt_private_key(
    pem: &[u8],
    source_name: &str,
    password: Option<&str>,
) -> Result<PrivateKeyDer<'static>, SecurityError> {
    let fail = |reason: String| SecurityError::PrivateKeyLoad {
        source_name: source_name.to_string(),
        reason,
    };

    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| fail("private key is encrypted and no password was provided".into()))?;

    let blocks = pem::parse_many(pem).map_err(|e| fail(e.to_string()))?;
    let block = blocks
        .iter()
        .find(|b| b.tag() == ENCRYPTED_PRIVATE_KEY_TAG)
        .ok_or_else(|| fail("no encrypted private key found".into()))?;

    let info = pkcs8::EncryptedPrivateKeyInfo::try_from(block.contents())
        .map_err(|e| fail(format!("malformed encrypted private key: {e}")))?;
    let document = info
        .decrypt(password)
        .map_err(|e| fail(format!("incorrect password or unsupported encryption: {e}")))?;

    Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        document.as_bytes().to_vec(),
    )))
}

/// Loads root certificates from PEM bytes.
pub fn load_root_certs(pem: &[u8], source_name: &str) -> Result<RootCertStore, SecurityError> {
    let certs = load_certs(pem, source_name)?;
    let mut root_store = RootCertStore::empty();

    for cert in certs {
        root_store
            .add(cert)
            .map_err(|e| SecurityError::CertificateLoad {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;
    }

    Ok(root_store)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestPki {
        ca_pem: String,
        client_cert_pem: String,
        client_key_pem: String,
        client_key_der: Vec<u8>,
    }

    fn generate_pki() -> TestPki {
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let mut ca_params = rcgen::CertificateParams::new(vec!["Test CA".into()]).unwrap();
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let client_key = rcgen::KeyPair::generate().unwrap();
        let client_params = rcgen::CertificateParams::new(vec!["client".into()]).unwrap();
        let client_cert = client_params
            .signed_by(&client_key, &ca_cert, &ca_key)
            .unwrap();

        TestPki {
            ca_pem: ca_cert.pem(),
            client_cert_pem: client_cert.pem(),
            client_key_pem: client_key.serialize_pem(),
            client_key_der: client_key.serialize_der(),
        }
    }

    fn encrypt_key(der: &[u8], password: &str) -> String {
        let info = pkcs8::PrivateKeyInfo::try_from(der).unwrap();
        let params =
            pkcs8::pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(2048, b"saltsalt", &[7u8; 16])
                .unwrap();
        let encrypted = info.encrypt_with_params(params, password).unwrap();
        pem::encode(&pem::Pem::new(
            ENCRYPTED_PRIVATE_KEY_TAG,
            encrypted.as_bytes().to_vec(),
        ))
    }

    #[test]
    fn test_load_certs() {
        let pki = generate_pki();
        let bundle = format!("{}{}", pki.client_cert_pem, pki.ca_pem);
        let certs = load_certs(bundle.as_bytes(), "bundle").unwrap();
        assert_eq!(certs.len(), 2);
    }

    #[test]
    fn test_load_certs_empty() {
        let result = load_certs(b"not a pem file", "empty");
        assert!(matches!(result, Err(SecurityError::CertificateLoad { .. })));
    }

    #[test]
    fn test_load_private_key_from_bundle() {
        let pki = generate_pki();
        let bundle = format!("{}{}", pki.client_cert_pem, pki.client_key_pem);
        let key = load_private_key(bundle.as_bytes(), "bundle", None).unwrap();
        assert!(matches!(key, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn test_load_encrypted_private_key() {
        let pki = generate_pki();
        let encrypted = encrypt_key(&pki.client_key_der, "hunter2");
        assert!(is_encrypted_private_key(encrypted.as_bytes()));

        let key = load_private_key(encrypted.as_bytes(), "encrypted", Some("hunter2")).unwrap();
        match key {
            PrivateKeyDer::Pkcs8(k) => assert_eq!(k.secret_pkcs8_der(), &pki.client_key_der[..]),
            other => panic!("unexpected key type {:?}", other),
        }
    }

    #[test]
    fn test_encrypted_private_key_requires_password() {
        let pki = generate_pki();
        let encrypted = encrypt_key(&pki.client_key_der, "hunter2");

        let missing = load_private_key(encrypted.as_bytes(), "encrypted", None);
        assert!(matches!(missing, Err(SecurityError::PrivateKeyLoad { .. })));

        let wrong = load_private_key(encrypted.as_bytes(), "encrypted", Some("wrong"));
        assert!(matches!(wrong, Err(SecurityError::PrivateKeyLoad { .. })));
    }

    #[test]
    fn test_load_private_key_missing() {
        let pki = generate_pki();
        let result = load_private_key(pki.client_cert_pem.as_bytes(), "cert only", None);
        assert!(matches!(result, Err(SecurityError::PrivateKeyLoad { .. })));
    }

    #[test]
    fn test_create_client_config() {
        let pki = generate_pki();
        let config = TlsConfig {
            client_certificate: pki.client_cert_pem.into_bytes(),
            client_private_key: pki.client_key_pem.into_bytes(),
            client_key_password: None,
            root_certificate: pki.ca_pem.into_bytes(),
        };

        let connector = create_tls_connector(&config);
        assert!(
            connector.is_ok(),
            "TLS connector creation failed: {:?}",
            connector.err()
        );
    }

    #[test]
    fn test_create_client_config_bad_root() {
        let pki = generate_pki();
        let config = TlsConfig {
            client_certificate: pki.client_cert_pem.into_bytes(),
            client_private_key: pki.client_key_pem.into_bytes(),
            client_key_password: None,
            root_certificate: b"garbage".to_vec(),
        };
        assert!(matches!(
            create_client_config(&config),
            Err(SecurityError::CertificateLoad { .. })
        ));
    }

    #[test]
    fn test_provider_excludes_cbc_suites() {
        let provider = kmip_crypto_provider();
        assert!(!provider.cipher_suites.is_empty());
        for suite in &provider.cipher_suites {
            let name = format!("{:?}", suite.suite());
            assert!(!name.contains("CBC"), "unexpected suite {}", name);
        }
    }

    #[test]
    fn test_tls_config_debug_redacts_key() {
        let config = TlsConfig {
            client_certificate: vec![1, 2, 3],
            client_private_key: b"secret key".to_vec(),
            client_key_password: Some("pw".into()),
            root_certificate: vec![4],
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret key"));
    }
}
