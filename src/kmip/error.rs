// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! KMIP error types.

use crate::security::SecurityError;

use super::types::{Operation, ProtocolVersion, ResultStatus, Tag};

/// Errors raised while configuring or talking to a KMIP server.
#[derive(Debug, thiserror::Error)]
pub enum KmipError {
    /// Requested protocol version is not 1.0, 1.2 or 2.0.
    #[error("invalid KMIP version: {0}")]
    InvalidVersion(ProtocolVersion),

    #[error("both server hostname and IP are not provided")]
    ServerAddressMissing,

    #[error("server port is not provided")]
    ServerPortMissing,

    #[error("root certificate is not provided")]
    RootCertMissing,

    #[error("client certificate is not provided")]
    ClientCertMissing,

    #[error("client private key is not provided")]
    ClientKeyMissing,

    /// Certificates or keys could not be loaded into a TLS configuration.
    #[error("failed to load certificate: {0}")]
    Tls(#[from] SecurityError),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// TCP connect or TLS handshake failed.
    #[error("connection to {server} failed: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be encoded to TTLV.
    #[error("TTLV encoding error: {0}")]
    Encode(String),

    /// Bytes on the wire are not valid TTLV.
    #[error("TTLV decoding error: {0}")]
    Decode(String),

    /// Response message exceeded the configured limit.
    #[error("response too large: {size} bytes (limit {limit})")]
    ResponseTooLarge { size: usize, limit: usize },

    /// A required field is absent from a response.
    #[error("missing {tag} in {context}")]
    MissingField { tag: Tag, context: &'static str },

    /// Server answered with a non-success result status.
    #[error("kmip request failure: failed to perform {operation} operation: {status}: {message}")]
    RequestFailed {
        operation: Operation,
        status: ResultStatus,
        message: String,
    },

    /// Response is well formed but not what the operation expects.
    #[error("failed to decode {operation} response: {reason}")]
    UnexpectedResponse {
        operation: Operation,
        reason: String,
    },
}

impl KmipError {
    pub(crate) fn missing(tag: Tag, context: &'static str) -> Self {
        KmipError::MissingField { tag, context }
    }
}
