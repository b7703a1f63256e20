// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Local key file provider.
//!
//! The KEK is stored base64-encoded in a plain text file. The LEK is
//! unwrapped with AES-CBC (no padding) using the header blob's IV.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::security::{cbc_decrypt, SecretBytes};

use super::error::KeyProviderError;
use super::identifier::KeyStoreProvider;
use super::prompt::CredentialPrompt;
use super::provider::{KeyProvider, WrappedLek};

/// A KEK held in a local file.
#[derive(Debug, Clone)]
pub struct LocalKeyIdentifier {
    filename: Option<PathBuf>,
}

impl LocalKeyIdentifier {
    pub fn new(filename: Option<PathBuf>) -> Self {
        Self { filename }
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    fn read_kek(&self) -> Result<SecretBytes, KeyProviderError> {
        let path = self
            .filename
            .as_deref()
            .ok_or(KeyProviderError::MissingField {
                provider: KeyStoreProvider::Local,
                field: "filename",
            })?;

        read_kek_file(path)
    }
}

/// Reads and base64-decodes a KEK file.
pub fn read_kek_file(path: &Path) -> Result<SecretBytes, KeyProviderError> {
    let contents = Zeroizing::new(std::fs::read_to_string(path).map_err(|source| {
        KeyProviderError::ReadFile {
            path: path.to_path_buf(),
            source,
        }
    })?);

    let kek = STANDARD
        .decode(contents.trim())
        .map_err(|e| KeyProviderError::InvalidBase64 {
            what: path.display().to_string(),
            reason: e.to_string(),
        })?;

    Ok(SecretBytes::from_vec(kek).map_err(crate::security::SecurityError::from)?)
}

#[async_trait]
impl KeyProvider for LocalKeyIdentifier {
    fn provider(&self) -> KeyStoreProvider {
        KeyStoreProvider::Local
    }

    /// Prompts for the key file when none is known or it does not exist.
    #[instrument(skip(self, prompt), fields(provider = "local"))]
    async fn validate_credentials(
        &mut self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<(), KeyProviderError> {
        if self.filename.as_deref().is_some_and(Path::is_file) {
            return Ok(());
        }

        let message = match &self.filename {
            Some(path) => format!(
                "Local key file {} not found, enter local key filename",
                path.display()
            ),
            None => "Enter local key filename".to_string(),
        };
        let answer = prompt.prompt(&message)?;
        if answer.is_empty() {
            return Err(KeyProviderError::MissingField {
                provider: KeyStoreProvider::Local,
                field: "filename",
            });
        }

        self.filename = Some(PathBuf::from(answer));
        Ok(())
    }

    #[instrument(skip(self, wrapped), fields(provider = "local"))]
    async fn decrypt_key(&self, wrapped: &WrappedLek<'_>) -> Result<SecretBytes, KeyProviderError> {
        let kek = self.read_kek()?;
        let lek = cbc_decrypt(kek.as_bytes(), wrapped.iv(), wrapped.encrypted_lek())?;
        debug!(lek_len = lek.len(), "Unwrapped LEK with local key");
        Ok(SecretBytes::from_vec(lek).map_err(crate::security::SecurityError::from)?)
    }
}
