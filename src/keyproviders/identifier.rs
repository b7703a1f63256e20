// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key store identifiers recorded in audit log headers.

use std::fmt;
use std::path::PathBuf;

use super::aws::AwsKeyIdentifier;
use super::azure::AzureKeyIdentifier;
use super::config::KeyProviderOpts;
use super::error::KeyProviderError;
use super::gcp::GcpKeyIdentifier;
use super::kmip::KmipKeyIdentifier;
use super::local::LocalKeyIdentifier;
use super::provider::KeyProvider;

/// Default KMIP port when the header does not record one.
pub const DEFAULT_KMIP_PORT: u16 = 5696;

/// Key provider named by a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyStoreProvider {
    Local,
    Kmip,
    Aws,
    Azure,
    Gcp,
}

impl KeyStoreProvider {
    pub fn parse(value: &str) -> Result<Self, KeyProviderError> {
        match value.to_ascii_lowercase().as_str() {
            "local" => Ok(KeyStoreProvider::Local),
            "kmip" => Ok(KeyStoreProvider::Kmip),
            "aws" => Ok(KeyStoreProvider::Aws),
            "azure" => Ok(KeyStoreProvider::Azure),
            "gcp" => Ok(KeyStoreProvider::Gcp),
            _ => Err(KeyProviderError::UnknownProvider(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStoreProvider::Local => "local",
            KeyStoreProvider::Kmip => "kmip",
            KeyStoreProvider::Aws => "aws",
            KeyStoreProvider::Azure => "azure",
            KeyStoreProvider::Gcp => "gcp",
        }
    }
}

impl fmt::Display for KeyStoreProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a KMIP-wrapped LEK is unwrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KmipKeyWrapMethod {
    /// Fetch the KEK with Get and unwrap locally with AES-GCM.
    #[default]
    Get,
    /// Ask the server to unwrap with its Decrypt operation.
    Encrypt,
}

impl KmipKeyWrapMethod {
    pub fn parse(value: &str) -> Result<Self, KeyProviderError> {
        match value.to_ascii_lowercase().as_str() {
            "" | "get" => Ok(KmipKeyWrapMethod::Get),
            "encrypt" => Ok(KmipKeyWrapMethod::Encrypt),
            _ => Err(KeyProviderError::InvalidWrapMethod(value.to_string())),
        }
    }
}

impl fmt::Display for KmipKeyWrapMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KmipKeyWrapMethod::Get => f.write_str("get"),
            KmipKeyWrapMethod::Encrypt => f.write_str("encrypt"),
        }
    }
}

/// The `keyStoreIdentifier` sub-document as recorded, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawKeyStoreIdentifier {
    pub provider: Option<String>,
    /// local
    pub filename: Option<String>,
    /// kmip
    pub uid: Option<String>,
    pub kmip_server_name: Vec<String>,
    pub kmip_port: Option<i64>,
    pub key_wrap_method: Option<String>,
    /// aws
    pub key: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// azure and gcp
    pub key_name: Option<String>,
    pub environment: Option<String>,
    pub key_vault_endpoint: Option<String>,
    pub key_version: Option<String>,
    /// gcp
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub key_ring: Option<String>,
}

/// A resolved key store identifier: one variant per provider.
#[derive(Debug)]
pub enum KeyStoreIdentifier {
    Local(LocalKeyIdentifier),
    Kmip(KmipKeyIdentifier),
    Aws(AwsKeyIdentifier),
    Azure(AzureKeyIdentifier),
    Gcp(GcpKeyIdentifier),
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl KeyStoreIdentifier {
    /// Resolves the recorded identifier, applying caller options.
    pub fn resolve(
        raw: &RawKeyStoreIdentifier,
        opts: &KeyProviderOpts,
    ) -> Result<Self, KeyProviderError> {
        let provider = non_empty(&raw.provider).ok_or(KeyProviderError::ProviderNotSet)?;
        let provider = KeyStoreProvider::parse(&provider)?;

        let missing = |field| KeyProviderError::MissingField { provider, field };

        Ok(match provider {
            KeyStoreProvider::Local => {
                let filename = opts
                    .local_key_file
                    .clone()
                    .or_else(|| non_empty(&raw.filename).map(PathBuf::from));
                KeyStoreIdentifier::Local(LocalKeyIdentifier::new(filename))
            }
            KeyStoreProvider::Kmip => {
                let uid = non_empty(&raw.uid).ok_or_else(|| missing("uid"))?;
                let servers: Vec<String> = raw
                    .kmip_server_name
                    .iter()
                    .filter(|s| !s.is_empty())
                    .cloned()
                    .collect();
                if servers.is_empty() {
                    return Err(missing("kmipServerName"));
                }
                let port = match raw.kmip_port {
                    None | Some(0) => DEFAULT_KMIP_PORT,
                    Some(p) => u16::try_from(p).map_err(|_| missing("valid kmipPort"))?,
                };
                let wrap_method =
                    KmipKeyWrapMethod::parse(raw.key_wrap_method.as_deref().unwrap_or_default())?;
                KeyStoreIdentifier::Kmip(KmipKeyIdentifier::new(
                    uid,
                    servers,
                    port,
                    wrap_method,
                    opts,
                ))
            }
            KeyStoreProvider::Aws => KeyStoreIdentifier::Aws(AwsKeyIdentifier::new(
                non_empty(&raw.key).ok_or_else(|| missing("key"))?,
                non_empty(&raw.region).ok_or_else(|| missing("region"))?,
                non_empty(&raw.endpoint),
                opts,
            )),
            KeyStoreProvider::Azure => KeyStoreIdentifier::Azure(AzureKeyIdentifier::new(
                non_empty(&raw.key_name).ok_or_else(|| missing("keyName"))?,
                non_empty(&raw.key_vault_endpoint).ok_or_else(|| missing("keyVaultEndpoint"))?,
                non_empty(&raw.key_version),
                non_empty(&raw.environment),
                opts,
            )),
            KeyStoreProvider::Gcp => KeyStoreIdentifier::Gcp(GcpKeyIdentifier::new(
                non_empty(&raw.project_id).ok_or_else(|| missing("projectId"))?,
                non_empty(&raw.location).ok_or_else(|| missing("location"))?,
                non_empty(&raw.key_ring).ok_or_else(|| missing("keyRing"))?,
                non_empty(&raw.key_name).ok_or_else(|| missing("keyName"))?,
                opts,
            )),
        })
    }

    pub fn provider(&self) -> KeyStoreProvider {
        self.as_provider().provider()
    }

    /// The single dispatch point from identifier to provider.
    pub fn as_provider(&self) -> &dyn KeyProvider {
        match self {
            KeyStoreIdentifier::Local(p) => p,
            KeyStoreIdentifier::Kmip(p) => p,
            KeyStoreIdentifier::Aws(p) => p,
            KeyStoreIdentifier::Azure(p) => p,
            KeyStoreIdentifier::Gcp(p) => p,
        }
    }

    pub fn as_provider_mut(&mut self) -> &mut dyn KeyProvider {
        match self {
            KeyStoreIdentifier::Local(p) => p,
            KeyStoreIdentifier::Kmip(p) => p,
            KeyStoreIdentifier::Aws(p) => p,
            KeyStoreIdentifier::Azure(p) => p,
            KeyStoreIdentifier::Gcp(p) => p,
        }
    }
}
