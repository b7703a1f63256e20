// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The key provider capability and the wrapped LEK it unwraps.

use async_trait::async_trait;

use crate::security::{SecretBytes, AES_BLOCK_SIZE};

use super::error::KeyProviderError;
use super::identifier::KeyStoreProvider;
use super::prompt::CredentialPrompt;

/// Offset of the encrypted LEK in a header's encrypted key blob.
pub const ENCRYPTED_LEK_OFFSET: usize = AES_BLOCK_SIZE;

/// Offset of the wrap tag; also the minimum blob length.
pub const WRAP_TAG_OFFSET: usize = 48;

/// A header's encrypted key blob: IV (0..16), encrypted LEK (16..48) and
/// wrap tag (48..).
#[derive(Clone, Copy)]
pub struct WrappedLek<'a> {
    blob: &'a [u8],
}

impl<'a> WrappedLek<'a> {
    /// Fails if the blob cannot hold an IV and a 256-bit encrypted LEK.
    pub fn new(blob: &'a [u8]) -> Result<Self, KeyProviderError> {
        if blob.len() < WRAP_TAG_OFFSET {
            return Err(KeyProviderError::EncryptedKeyTooShort {
                got: blob.len(),
                min: WRAP_TAG_OFFSET,
            });
        }
        Ok(Self { blob })
    }

    pub fn iv(&self) -> &'a [u8] {
        &self.blob[..ENCRYPTED_LEK_OFFSET]
    }

    pub fn encrypted_lek(&self) -> &'a [u8] {
        &self.blob[ENCRYPTED_LEK_OFFSET..WRAP_TAG_OFFSET]
    }

    pub fn tag(&self) -> &'a [u8] {
        &self.blob[WRAP_TAG_OFFSET..]
    }

    /// The whole blob, for providers with their own framing.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.blob
    }
}

impl std::fmt::Debug for WrappedLek<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedLek")
            .field("len", &self.blob.len())
            .finish()
    }
}

/// A source of KEKs able to unwrap a header's LEK.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    fn provider(&self) -> KeyStoreProvider;

    /// Locates and checks credentials, prompting for missing values.
    async fn validate_credentials(
        &mut self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<(), KeyProviderError>;

    /// Unwraps the LEK. The returned key is zeroized on drop.
    async fn decrypt_key(&self, wrapped: &WrappedLek<'_>) -> Result<SecretBytes, KeyProviderError>;
}
