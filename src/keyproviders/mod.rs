// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Key providers that unwrap an audit log's LEK.
//!
//! A header's key store identifier is resolved into a
//! [`KeyStoreIdentifier`], which dispatches to one [`KeyProvider`]:
//!
//! | provider | KEK location                  | unwrap                      |
//! |----------|-------------------------------|-----------------------------|
//! | `local`  | base64 file                   | AES-256-CBC, no padding     |
//! | `kmip`   | KMIP server (Get or Decrypt)  | AES-GCM, 12-byte tag, or server-side |
//! | `aws`    | AWS KMS                       | not implemented             |
//! | `azure`  | Azure Key Vault               | not implemented             |
//! | `gcp`    | Google Cloud KMS              | not implemented             |

mod aws;
mod azure;
mod config;
mod error;
mod gcp;
mod identifier;
mod kmip;
mod local;
pub mod prompt;
mod provider;

pub use aws::{AwsCredentialSource, AwsCredentials, AwsKeyIdentifier};
pub use azure::{AzureCredentials, AzureKeyIdentifier};
pub use config::{Environment, KeyProviderOpts};
pub use error::KeyProviderError;
pub use gcp::{GcpKeyIdentifier, ServiceAccountKey};
pub use identifier::{
    KeyStoreIdentifier, KeyStoreProvider, KmipKeyWrapMethod, RawKeyStoreIdentifier,
    DEFAULT_KMIP_PORT,
};
pub use kmip::{KmipEncryptedKey, KmipKeyIdentifier, KMIP_WRAP_TAG_SIZE};
pub use local::{read_kek_file, LocalKeyIdentifier};
pub use prompt::{CredentialPrompt, InteractivePrompt, NonInteractivePrompt};
pub use provider::{KeyProvider, WrappedLek, ENCRYPTED_LEK_OFFSET, WRAP_TAG_OFFSET};
