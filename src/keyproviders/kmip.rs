// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! KMIP key provider.
//!
//! The header's encrypted key is a BSON document `{iv, key}`. With the
//! `get` wrap method the KEK is fetched and the LEK unwrapped locally with
//! AES-GCM (tag = first 12 bytes of `key`, AAD = key identifier). With the
//! `encrypt` wrap method the server unwraps it with its Decrypt operation.
//!
//! Servers listed in the header are tried in order until one succeeds.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::kmip::{KmipClient, KmipConfig, ProtocolVersion};
use crate::security::tls::is_encrypted_private_key;
use crate::security::{create_client_config, gcm_decrypt, GcmInput, SecretBytes, TlsConfig};

use super::config::KeyProviderOpts;
use super::error::KeyProviderError;
use super::identifier::{KeyStoreProvider, KmipKeyWrapMethod};
use super::prompt::CredentialPrompt;
use super::provider::{KeyProvider, WrappedLek};

/// GCM tag length used when the LEK is wrapped under a fetched KEK.
pub const KMIP_WRAP_TAG_SIZE: usize = 12;

/// Protocol version for Get requests.
const GET_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V1_0;

/// Protocol version for Decrypt requests.
const DECRYPT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V1_2;

/// The `{iv, key}` document stored as a KMIP header's encrypted key.
pub struct KmipEncryptedKey {
    pub iv: Vec<u8>,
    pub key: Vec<u8>,
}

impl KmipEncryptedKey {
    pub fn decode(blob: &[u8]) -> Result<Self, KeyProviderError> {
        let doc = bson::Document::from_reader(blob)
            .map_err(|e| KeyProviderError::InvalidEncryptedKey(e.to_string()))?;

        let binary = |name: &str| {
            doc.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .and_then(|(_, v)| match v {
                    bson::Bson::Binary(b) => Some(b.bytes.clone()),
                    _ => None,
                })
                .ok_or_else(|| {
                    KeyProviderError::InvalidEncryptedKey(format!("missing binary field {}", name))
                })
        };

        Ok(Self {
            iv: binary("iv")?,
            key: binary("key")?,
        })
    }
}

#[derive(Clone)]
struct TlsMaterial {
    root_certificate: Vec<u8>,
    client_bundle: Vec<u8>,
    client_key_password: Option<Zeroizing<String>>,
}

/// A KEK held by a KMIP server.
pub struct KmipKeyIdentifier {
    unique_key_id: String,
    server_names: Vec<String>,
    port: u16,
    wrap_method: KmipKeyWrapMethod,
    server_ca_file: Option<PathBuf>,
    client_certificate_file: Option<PathBuf>,
    client_certificate_password: Option<Zeroizing<String>>,
    username: Option<String>,
    password: Option<Zeroizing<String>>,
    material: Option<TlsMaterial>,
}

impl std::fmt::Debug for KmipKeyIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmipKeyIdentifier")
            .field("unique_key_id", &self.unique_key_id)
            .field("server_names", &self.server_names)
            .field("port", &self.port)
            .field("wrap_method", &self.wrap_method)
            .field("server_ca_file", &self.server_ca_file)
            .field("client_certificate_file", &self.client_certificate_file)
            .finish()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, KeyProviderError> {
    std::fs::read(path).map_err(|source| KeyProviderError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn prompt_path(
    current: &Option<PathBuf>,
    prompt: &dyn CredentialPrompt,
    message: &str,
    field: &'static str,
) -> Result<PathBuf, KeyProviderError> {
    if let Some(path) = current {
        return Ok(path.clone());
    }
    let answer = prompt.prompt(message)?;
    if answer.is_empty() {
        return Err(KeyProviderError::MissingField {
            provider: KeyStoreProvider::Kmip,
            field,
        });
    }
    Ok(PathBuf::from(answer))
}

impl KmipKeyIdentifier {
    pub fn new(
        unique_key_id: String,
        server_names: Vec<String>,
        port: u16,
        wrap_method: KmipKeyWrapMethod,
        opts: &KeyProviderOpts,
    ) -> Self {
        Self {
            unique_key_id,
            server_names,
            port,
            wrap_method,
            server_ca_file: opts.kmip_server_ca_file.clone(),
            client_certificate_file: opts.kmip_client_certificate_file.clone(),
            client_certificate_password: opts.kmip_client_certificate_password.clone(),
            username: opts.kmip_username.clone(),
            password: opts.kmip_password.clone(),
            material: None,
        }
    }

    pub fn unique_key_id(&self) -> &str {
        &self.unique_key_id
    }

    pub fn server_names(&self) -> &[String] {
        &self.server_names
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn wrap_method(&self) -> KmipKeyWrapMethod {
        self.wrap_method
    }

    fn client(
        &self,
        server: &str,
        version: ProtocolVersion,
        material: &TlsMaterial,
    ) -> Result<KmipClient, KeyProviderError> {
        let mut config = KmipConfig::new(version, self.port)
            .with_client_certificate(material.client_bundle.clone(), material.client_bundle.clone())
            .with_client_key_password(
                material
                    .client_key_password
                    .as_ref()
                    .map(|p| p.as_str().to_string()),
            )
            .with_root_certificate(material.root_certificate.clone());

        config = if server.parse::<IpAddr>().is_ok() {
            config.with_ip(server)
        } else {
            config.with_hostname(server)
        };

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(username.as_str(), password.as_str());
        }

        Ok(KmipClient::new(config)?)
    }

    async fn unwrap_with(
        &self,
        server: &str,
        material: &TlsMaterial,
        encrypted: &KmipEncryptedKey,
    ) -> Result<SecretBytes, KeyProviderError> {
        match self.wrap_method {
            KmipKeyWrapMethod::Get => {
                let client = self.client(server, GET_PROTOCOL_VERSION, material)?;
                let kek = client.get_symmetric_key(&self.unique_key_id).await?;

                if encrypted.key.len() < KMIP_WRAP_TAG_SIZE {
                    return Err(KeyProviderError::InvalidEncryptedKey(format!(
                        "key is {} bytes, shorter than the {}-byte tag",
                        encrypted.key.len(),
                        KMIP_WRAP_TAG_SIZE
                    )));
                }
                let (tag, ciphertext) = encrypted.key.split_at(KMIP_WRAP_TAG_SIZE);

                let lek = gcm_decrypt(&GcmInput {
                    key: kek.as_slice(),
                    iv: &encrypted.iv,
                    aad: self.unique_key_id.as_bytes(),
                    ciphertext,
                    tag,
                })?;
                Ok(SecretBytes::from_vec(lek).map_err(crate::security::SecurityError::from)?)
            }
            KmipKeyWrapMethod::Encrypt => {
                let client = self.client(server, DECRYPT_PROTOCOL_VERSION, material)?;
                let response = client
                    .decrypt(&self.unique_key_id, &encrypted.key, &encrypted.iv)
                    .await?;
                Ok(SecretBytes::from_slice(&response.data)
                    .map_err(crate::security::SecurityError::from)?)
            }
        }
    }
}

#[async_trait]
impl KeyProvider for KmipKeyIdentifier {
    fn provider(&self) -> KeyStoreProvider {
        KeyStoreProvider::Kmip
    }

    /// Loads the CA and client certificate, prompting for missing paths
    /// and for the password of an encrypted client key. No network I/O.
    #[instrument(skip(self, prompt), fields(provider = "kmip", uid = %self.unique_key_id))]
    async fn validate_credentials(
        &mut self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<(), KeyProviderError> {
        let ca_file = prompt_path(
            &self.server_ca_file,
            prompt,
            "Enter KMIP server CA filename",
            "server CA file",
        )?;
        let cert_file = prompt_path(
            &self.client_certificate_file,
            prompt,
            "Enter KMIP client certificate filename",
            "client certificate file",
        )?;

        let root_certificate = read_file(&ca_file)?;
        let client_bundle = read_file(&cert_file)?;

        let mut password = self.client_certificate_password.clone();
        if password.is_none() && is_encrypted_private_key(&client_bundle) {
            let answer = prompt.prompt_secret("Enter KMIP client certificate password")?;
            if !answer.is_empty() {
                password = Some(answer);
            }
        }

        let material = TlsMaterial {
            root_certificate,
            client_bundle,
            client_key_password: password,
        };

        create_client_config(&TlsConfig {
            client_certificate: material.client_bundle.clone(),
            client_private_key: material.client_bundle.clone(),
            client_key_password: material
                .client_key_password
                .as_ref()
                .map(|p| p.as_str().to_string()),
            root_certificate: material.root_certificate.clone(),
        })
        .map_err(KeyProviderError::Security)?;

        self.server_ca_file = Some(ca_file);
        self.client_certificate_file = Some(cert_file);
        self.client_certificate_password = material.client_key_password.clone();
        self.material = Some(material);

        info!("KMIP client certificate loaded");
        Ok(())
    }

    #[instrument(skip(self, wrapped), fields(provider = "kmip", uid = %self.unique_key_id, method = %self.wrap_method))]
    async fn decrypt_key(&self, wrapped: &WrappedLek<'_>) -> Result<SecretBytes, KeyProviderError> {
        let material = self
            .material
            .as_ref()
            .ok_or(KeyProviderError::NotValidated(KeyStoreProvider::Kmip))?;
        let encrypted = KmipEncryptedKey::decode(wrapped.as_bytes())?;

        let mut last_error = None;
        for server in &self.server_names {
            match self.unwrap_with(server, material, &encrypted).await {
                Ok(lek) => {
                    debug!(server = %server, "Unwrapped LEK with KMIP");
                    return Ok(lek);
                }
                Err(e) => {
                    warn!(server = %server, error = %e, "KMIP server failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(KeyProviderError::MissingField {
            provider: KeyStoreProvider::Kmip,
            field: "kmipServerName",
        }))
    }
}
