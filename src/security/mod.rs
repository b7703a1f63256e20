// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Cryptographic primitives and transport security.
//!
//! - [`aead`]: AES-GCM with variable tag lengths and unpadded AES-CBC
//! - [`memlock`]: locked, zeroizing storage for LEKs and KEKs
//! - [`tls`]: mutual-TLS client configuration for KMIP servers

pub mod aead;
mod error;
pub mod memlock;
pub mod tls;

pub use aead::{
    cbc_decrypt, gcm_decrypt, GcmInput, AES_256_KEY_SIZE, AES_BLOCK_SIZE, AES_GCM_NONCE_SIZE,
    AES_KEY_SIZES,
};
pub use error::SecurityError;
pub use memlock::{MemlockError, SecretBytes};
pub use tls::{create_client_config, create_tls_connector, TlsConfig};
