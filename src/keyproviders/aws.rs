// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! AWS KMS key provider.
//!
//! Credentials are located in order: options, the `AWS_*` environment
//! variables, the shared credentials profile, then the prompt. The two
//! middle sources are `aws-config` credential providers. Those read the
//! process environment, so a fixed [`Environment`] turns off the
//! environment-variable source and names the credentials file explicitly
//! through its own `AWS_SHARED_CREDENTIALS_FILE` and `AWS_PROFILE`.
//! Unwrapping is not implemented.

use async_trait::async_trait;
use aws_config::environment::EnvironmentVariableCredentialsProvider;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::security::SecretBytes;

use super::config::{Environment, KeyProviderOpts};
use super::error::KeyProviderError;
use super::identifier::KeyStoreProvider;
use super::prompt::CredentialPrompt;
use super::provider::{KeyProvider, WrappedLek};

const DEFAULT_PROFILE: &str = "default";

#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: Zeroizing<String>,
    pub session_token: Option<Zeroizing<String>>,
}

impl From<&Credentials> for AwsCredentials {
    fn from(credentials: &Credentials) -> Self {
        Self {
            access_key: credentials.access_key_id().to_string(),
            secret_key: Zeroizing::new(credentials.secret_access_key().to_string()),
            session_token: credentials
                .session_token()
                .map(|token| Zeroizing::new(token.to_string())),
        }
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

/// Where a set of credentials was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwsCredentialSource {
    Options,
    Environment,
    Profile,
    Prompt,
}

/// A KMS key, by ARN or alias, in a region.
#[derive(Debug)]
pub struct AwsKeyIdentifier {
    key: String,
    region: String,
    endpoint: Option<String>,
    environment: Environment,
    credentials: Option<AwsCredentials>,
    source: Option<AwsCredentialSource>,
}

impl AwsKeyIdentifier {
    pub fn new(
        key: String,
        region: String,
        endpoint: Option<String>,
        opts: &KeyProviderOpts,
    ) -> Self {
        let credentials = match (&opts.aws_access_key, &opts.aws_secret_key) {
            (Some(access_key), Some(secret_key)) => Some(AwsCredentials {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                session_token: opts.aws_session_token.clone(),
            }),
            _ => None,
        };
        let source = credentials.as_ref().map(|_| AwsCredentialSource::Options);

        Self {
            key,
            region,
            endpoint,
            environment: opts.environment.clone(),
            credentials,
            source,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn credential_source(&self) -> Option<AwsCredentialSource> {
        self.source
    }

    pub fn credentials(&self) -> Option<&AwsCredentials> {
        self.credentials.as_ref()
    }

    fn environment_provider(&self) -> Option<EnvironmentVariableCredentialsProvider> {
        match self.environment {
            Environment::Process => Some(EnvironmentVariableCredentialsProvider::new()),
            Environment::Fixed(_) => None,
        }
    }

    fn profile_provider(&self) -> Option<ProfileFileCredentialsProvider> {
        let profile = self
            .environment
            .get("AWS_PROFILE")
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let builder = ProfileFileCredentialsProvider::builder().profile_name(profile);

        match self.environment {
            Environment::Process => Some(builder.build()),
            Environment::Fixed(_) => {
                let path = self.environment.get("AWS_SHARED_CREDENTIALS_FILE")?;
                let files = ProfileFiles::builder()
                    .with_file(ProfileFileKind::Credentials, path)
                    .build();
                Some(builder.profile_files(files).build())
            }
        }
    }

    fn prompted_credentials(
        &self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<AwsCredentials, KeyProviderError> {
        let access_key = prompt.prompt("Enter AWS access key ID")?;
        let secret_key = prompt.prompt_secret("Enter AWS secret access key")?;
        let session_token = prompt.prompt_secret("Enter AWS session token (optional)")?;
        Ok(AwsCredentials {
            access_key,
            secret_key,
            session_token: (!session_token.is_empty()).then_some(session_token),
        })
    }
}

/// Asks one `aws-config` credential source; an unavailable source is `None`.
async fn ask_source<P>(
    source: AwsCredentialSource,
    provider: Option<P>,
) -> Option<AwsCredentials>
where
    P: ProvideCredentials,
{
    match provider?.provide_credentials().await {
        Ok(credentials) => Some(AwsCredentials::from(&credentials)),
        Err(e) => {
            debug!(source = ?source, error = %e, "AWS credential source unavailable");
            None
        }
    }
}

#[async_trait]
impl KeyProvider for AwsKeyIdentifier {
    fn provider(&self) -> KeyStoreProvider {
        KeyStoreProvider::Aws
    }

    #[instrument(skip(self, prompt), fields(provider = "aws", region = %self.region))]
    async fn validate_credentials(
        &mut self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<(), KeyProviderError> {
        if self.credentials.is_some() {
            return Ok(());
        }

        let environment = self.environment_provider();
        let found = match ask_source(AwsCredentialSource::Environment, environment).await {
            Some(c) => Some((c, AwsCredentialSource::Environment)),
            None => ask_source(AwsCredentialSource::Profile, self.profile_provider())
                .await
                .map(|c| (c, AwsCredentialSource::Profile)),
        };

        // An empty prompt answer is kept as empty credentials.
        let (credentials, source) = match found {
            Some(found) => found,
            None => (self.prompted_credentials(prompt)?, AwsCredentialSource::Prompt),
        };
        if credentials.access_key.is_empty() {
            debug!("Continuing with empty AWS credentials");
        } else {
            debug!(source = ?source, "AWS credentials located");
        }
        self.credentials = Some(credentials);
        self.source = Some(source);
        Ok(())
    }

    async fn decrypt_key(&self, _wrapped: &WrappedLek<'_>) -> Result<SecretBytes, KeyProviderError> {
        Err(KeyProviderError::NotImplemented(KeyStoreProvider::Aws))
    }
}
