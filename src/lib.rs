// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Decrypts MongoDB encrypted audit log files.
//!
//! An encrypted audit log interleaves header records, each carrying a log
//! encryption key (LEK) wrapped by a key provider, with AES-GCM encrypted
//! log records. This crate scans JSON or BSON audit logs, unwraps each
//! LEK through the local-file or KMIP key providers, and emits every
//! decrypted record as one line of relaxed extended JSON.
//!
//! - [`security`]: AEAD primitives, locked secret buffers, mTLS configuration
//! - [`kmip`]: TTLV codec and KMIP client
//! - [`keyproviders`]: key store identifiers and LEK unwrap
//! - [`decryption`]: scanner, record decoders and the decrypt pipeline

pub mod decryption;
pub mod keyproviders;
pub mod kmip;
pub mod security;

pub use decryption::{
    DecryptError, DecryptSummary, Decryptor, LineError, OutputSink, ScanError, WriterSink,
};
pub use keyproviders::{
    CredentialPrompt, InteractivePrompt, KeyProviderError, KeyProviderOpts, NonInteractivePrompt,
};
pub use kmip::{KmipClient, KmipConfig, KmipError};
pub use security::{SecretBytes, SecurityError};
