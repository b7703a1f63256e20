// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Minimal KMIP client.
//!
//! Supports the Get, Create, Encrypt and Decrypt operations over mutually
//! authenticated TLS, with TTLV encoding, for protocol versions 1.0, 1.2
//! and 2.0.
//!
//! # Example
//!
//! ```rust,no_run
//! use audit_decrypt::kmip::{KmipClient, KmipConfig, ProtocolVersion};
//!
//! # async fn example(cert: Vec<u8>, key: Vec<u8>, ca: Vec<u8>) -> Result<(), audit_decrypt::kmip::KmipError> {
//! let config = KmipConfig::new(ProtocolVersion::V1_0, 5696)
//!     .with_hostname("kmip.example.com")
//!     .with_client_certificate(cert, key)
//!     .with_root_certificate(ca);
//! let client = KmipClient::new(config)?;
//! let kek = client.get_symmetric_key("1").await?;
//! # let _ = kek;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod message;
#[cfg(test)]
pub(crate) mod testing;
pub mod ttlv;
mod types;

pub use client::{KmipClient, KmipConfig};
pub use error::KmipError;
pub use message::{CreateResponse, DecryptResponse, EncryptResponse, GetResponse};
pub use ttlv::{Ttlv, Value};
pub use types::{ItemType, Operation, ProtocolVersion, ResultStatus, Tag};
