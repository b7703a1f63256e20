// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Security error types.

use super::memlock::MemlockError;

/// Errors raised by the AEAD primitives, secret buffers and TLS setup.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    /// AES-GCM authentication failed or the ciphertext is malformed.
    #[error("AES-GCM decryption failed: {0}")]
    GcmDecrypt(String),

    /// AES-CBC decryption failed (bad key, IV or ciphertext length).
    #[error("AES decrypt error: {0}")]
    AesDecrypt(String),

    /// Invalid key length.
    #[error("invalid key length: expected one of {expected:?}, got {got}")]
    InvalidKeyLength {
        expected: &'static [usize],
        got: usize,
    },

    /// Invalid nonce/IV length.
    #[error("invalid IV length: expected {expected}, got {got}")]
    InvalidIvLength { expected: usize, got: usize },

    /// Invalid authentication tag length.
    #[error("invalid tag length: expected 12..=16, got {0}")]
    InvalidTagLength(usize),

    /// Certificate loading failed.
    #[error("failed to load certificate from {source_name}: {reason}")]
    CertificateLoad { source_name: String, reason: String },

    /// Private key loading failed.
    #[error("failed to load private key from {source_name}: {reason}")]
    PrivateKeyLoad { source_name: String, reason: String },

    /// TLS configuration error.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Secret buffer allocation failed.
    #[error("secret buffer error: {0}")]
    Memlock(#[from] MemlockError),
}

impl From<rustls::Error> for SecurityError {
    fn from(err: rustls::Error) -> Self {
        SecurityError::TlsConfig(err.to_string())
    }
}
