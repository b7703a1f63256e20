// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Caller-supplied key provider options.
//!
//! Values set here take precedence over the values recorded in the audit
//! log header and over the environment.

use std::collections::HashMap;
use std::path::PathBuf;

use zeroize::Zeroizing;

/// Where providers look up environment variables.
#[derive(Debug, Clone, Default)]
pub enum Environment {
    /// The process environment.
    #[default]
    Process,
    /// A fixed set of variables.
    Fixed(HashMap<String, String>),
}

impl Environment {
    /// Creates a fixed environment from name/value pairs.
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Environment::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the variable's value, treating empty values as unset.
    pub fn get(&self, name: &str) -> Option<String> {
        let value = match self {
            Environment::Process => std::env::var(name).ok(),
            Environment::Fixed(vars) => vars.get(name).cloned(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Options applied to every key provider resolved from a header.
#[derive(Clone, Default)]
pub struct KeyProviderOpts {
    /// Local KEK file, overriding the header's `filename`.
    pub local_key_file: Option<PathBuf>,
    /// PEM root CA for KMIP servers.
    pub kmip_server_ca_file: Option<PathBuf>,
    /// PEM bundle holding the KMIP client certificate and private key.
    pub kmip_client_certificate_file: Option<PathBuf>,
    /// Password of an encrypted client private key.
    pub kmip_client_certificate_password: Option<Zeroizing<String>>,
    pub kmip_username: Option<String>,
    pub kmip_password: Option<Zeroizing<String>>,
    pub aws_access_key: Option<String>,
    pub aws_secret_key: Option<Zeroizing<String>>,
    pub aws_session_token: Option<Zeroizing<String>>,
    pub azure_tenant_id: Option<String>,
    pub azure_client_id: Option<String>,
    pub azure_secret: Option<Zeroizing<String>>,
    /// GCP service account JSON key file.
    pub gcp_service_account_key_file: Option<PathBuf>,
    pub environment: Environment,
}

impl std::fmt::Debug for KeyProviderOpts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |set: bool| if set { "[REDACTED]" } else { "None" };
        f.debug_struct("KeyProviderOpts")
            .field("local_key_file", &self.local_key_file)
            .field("kmip_server_ca_file", &self.kmip_server_ca_file)
            .field(
                "kmip_client_certificate_file",
                &self.kmip_client_certificate_file,
            )
            .field(
                "kmip_client_certificate_password",
                &redact(self.kmip_client_certificate_password.is_some()),
            )
            .field("kmip_username", &self.kmip_username)
            .field("kmip_password", &redact(self.kmip_password.is_some()))
            .field("aws_access_key", &self.aws_access_key)
            .field("aws_secret_key", &redact(self.aws_secret_key.is_some()))
            .field("azure_tenant_id", &self.azure_tenant_id)
            .field("azure_client_id", &self.azure_client_id)
            .field("azure_secret", &redact(self.azure_secret.is_some()))
            .field(
                "gcp_service_account_key_file",
                &self.gcp_service_account_key_file,
            )
            .finish()
    }
}

impl KeyProviderOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_key_file = Some(path.into());
        self
    }

    pub fn with_kmip_server_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.kmip_server_ca_file = Some(path.into());
        self
    }

    pub fn with_kmip_client_certificate_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.kmip_client_certificate_file = Some(path.into());
        self
    }

    pub fn with_kmip_client_certificate_password(mut self, password: impl Into<String>) -> Self {
        self.kmip_client_certificate_password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn with_kmip_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.kmip_username = Some(username.into());
        self.kmip_password = Some(Zeroizing::new(password.into()));
        self
    }

    pub fn with_aws_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        self.aws_access_key = Some(access_key.into());
        self.aws_secret_key = Some(Zeroizing::new(secret_key.into()));
        self.aws_session_token = session_token.map(Zeroizing::new);
        self
    }

    pub fn with_azure_credentials(
        mut self,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.azure_tenant_id = Some(tenant_id.into());
        self.azure_client_id = Some(client_id.into());
        self.azure_secret = Some(Zeroizing::new(secret.into()));
        self
    }

    pub fn with_gcp_service_account_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.gcp_service_account_key_file = Some(path.into());
        self
    }

    /// Replaces the environment providers read credentials from.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}
