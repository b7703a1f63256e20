// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Azure Key Vault key provider. Validates a service principal; unwrapping
//! is not implemented.

use async_trait::async_trait;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::security::SecretBytes;

use super::config::{Environment, KeyProviderOpts};
use super::error::KeyProviderError;
use super::identifier::KeyStoreProvider;
use super::prompt::CredentialPrompt;
use super::provider::{KeyProvider, WrappedLek};

/// Client-secret credentials of an Azure service principal.
#[derive(Clone)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub secret: Zeroizing<String>,
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A key in an Azure Key Vault.
#[derive(Debug)]
pub struct AzureKeyIdentifier {
    key_name: String,
    key_vault_endpoint: String,
    key_version: Option<String>,
    environment_name: Option<String>,
    environment: Environment,
    credentials: Option<AzureCredentials>,
}

impl AzureKeyIdentifier {
    pub fn new(
        key_name: String,
        key_vault_endpoint: String,
        key_version: Option<String>,
        environment_name: Option<String>,
        opts: &KeyProviderOpts,
    ) -> Self {
        let credentials = match (&opts.azure_tenant_id, &opts.azure_client_id, &opts.azure_secret)
        {
            (Some(tenant_id), Some(client_id), Some(secret)) => Some(AzureCredentials {
                tenant_id: tenant_id.clone(),
                client_id: client_id.clone(),
                secret: secret.clone(),
            }),
            _ => None,
        };

        Self {
            key_name,
            key_vault_endpoint,
            key_version,
            environment_name,
            environment: opts.environment.clone(),
            credentials,
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn key_vault_endpoint(&self) -> &str {
        &self.key_vault_endpoint
    }

    pub fn key_version(&self) -> Option<&str> {
        self.key_version.as_deref()
    }

    /// Azure cloud name from the header, e.g. `AZUREPUBLICCLOUD`.
    pub fn environment_name(&self) -> Option<&str> {
        self.environment_name.as_deref()
    }

    pub fn credentials(&self) -> Option<&AzureCredentials> {
        self.credentials.as_ref()
    }
}

#[async_trait]
impl KeyProvider for AzureKeyIdentifier {
    fn provider(&self) -> KeyStoreProvider {
        KeyStoreProvider::Azure
    }

    /// Fills each missing value from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`
    /// and `AZURE_CLIENT_SECRET`, then from the prompt. Values the prompt
    /// leaves empty stay empty.
    #[instrument(skip(self, prompt), fields(provider = "azure", key = %self.key_name))]
    async fn validate_credentials(
        &mut self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<(), KeyProviderError> {
        if self.credentials.is_some() {
            return Ok(());
        }

        let tenant_id = match self.environment.get("AZURE_TENANT_ID") {
            Some(v) => v,
            None => prompt.prompt("Enter Azure tenant ID")?,
        };
        let client_id = match self.environment.get("AZURE_CLIENT_ID") {
            Some(v) => v,
            None => prompt.prompt("Enter Azure client ID")?,
        };
        let secret = match self.environment.get("AZURE_CLIENT_SECRET") {
            Some(v) => Zeroizing::new(v),
            None => prompt.prompt_secret("Enter Azure client secret")?,
        };

        if tenant_id.is_empty() || client_id.is_empty() || secret.is_empty() {
            debug!("Continuing with incomplete Azure credentials");
        } else {
            debug!(tenant_id = %tenant_id, client_id = %client_id, "Azure credentials located");
        }
        self.credentials = Some(AzureCredentials {
            tenant_id,
            client_id,
            secret,
        });
        Ok(())
    }

    async fn decrypt_key(&self, _wrapped: &WrappedLek<'_>) -> Result<SecretBytes, KeyProviderError> {
        Err(KeyProviderError::NotImplemented(KeyStoreProvider::Azure))
    }
}
