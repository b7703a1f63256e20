// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key provider error types.

use std::path::PathBuf;

use crate::kmip::KmipError;
use crate::security::SecurityError;

use super::identifier::KeyStoreProvider;

/// Errors raised while resolving a key provider or unwrapping a LEK.
#[derive(Debug, thiserror::Error)]
pub enum KeyProviderError {
    /// The header's key store identifier names no provider.
    #[error("keyProvider not set")]
    ProviderNotSet,

    #[error("unknown key provider: {0}")]
    UnknownProvider(String),

    /// The provider validates credentials but cannot unwrap keys.
    #[error("{0} key provider: decrypt key is not implemented")]
    NotImplemented(KeyStoreProvider),

    /// A required key store identifier field or option is absent.
    #[error("{provider} key provider: {field} is required")]
    MissingField {
        provider: KeyStoreProvider,
        field: &'static str,
    },

    #[error("invalid KMIP key wrap method: {0}")]
    InvalidWrapMethod(String),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid base64 in {what}: {reason}")]
    InvalidBase64 { what: String, reason: String },

    /// Header blob too short to hold IV and encrypted LEK.
    #[error("encrypted key is {got} bytes, expected at least {min}")]
    EncryptedKeyTooShort { got: usize, min: usize },

    /// KMIP encrypted key is not a `{iv, key}` BSON document.
    #[error("invalid KMIP encrypted key: {0}")]
    InvalidEncryptedKey(String),

    /// No credentials were found in options, environment or prompt.
    #[error("{provider} key provider: credentials not found: {reason}")]
    CredentialsNotFound {
        provider: KeyStoreProvider,
        reason: String,
    },

    /// `decrypt_key` called before `validate_credentials`.
    #[error("{0} key provider: credentials have not been validated")]
    NotValidated(KeyStoreProvider),

    #[error("prompt failed: {0}")]
    Prompt(#[source] std::io::Error),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Kmip(#[from] KmipError),
}
