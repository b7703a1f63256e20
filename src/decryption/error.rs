// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Decryption error types.
//!
//! `ScanError` is fatal to the whole run. `LineError` is fatal to one line
//! (or, for a header, to its section) and is reported through the output
//! sink.

use std::io;

use crate::keyproviders::KeyProviderError;
use crate::security::SecurityError;

/// Errors reading the audit log stream.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("no bytes to read")]
    NoBytesToRead,

    /// The stream could not be rewound after peeking its first byte.
    #[error("seek not allowed: {0}")]
    SeekNotAllowed(String),

    /// A BSON length prefix is below the minimum document size.
    #[error("line {line}: invalid BSON document length {length}")]
    InvalidDocumentLength { line: u64, length: i32 },

    #[error("line {line}: record of {length} bytes exceeds the {limit} byte limit")]
    DocumentTooLarge { line: u64, length: usize, limit: usize },

    /// The stream ended inside a record.
    #[error("line {line}: truncated record: expected {expected} bytes, got {got}")]
    TruncatedDocument {
        line: u64,
        expected: usize,
        got: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors confined to a single audit log line.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("invalid extended JSON: {0}")]
    ExtendedJson(String),

    #[error("invalid BSON: {0}")]
    Bson(String),

    #[error("unknown auditRecordType: {0}")]
    UnknownRecordType(String),

    /// A field has the wrong BSON type.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A header is missing a required field or has an invalid one.
    #[error("header validation failed: {field}: {reason}")]
    HeaderValidation { field: &'static str, reason: String },

    /// A header's encrypted key cannot hold an IV and an encrypted LEK.
    #[error("encrypted key is {got} bytes, expected at least {min}")]
    EncryptedKeyTooShort { got: usize, min: usize },

    #[error("log record is missing {0}")]
    MissingLogField(&'static str),

    #[error("invalid base64 in log: {0}")]
    InvalidBase64(String),

    #[error("log record is {got} bytes, expected at least {min}")]
    LogRecordTooShort { got: usize, min: usize },

    /// A record arrived out of order within its section.
    #[error("invalid log record order: expected key invocation count {expected}, got {actual}")]
    InvocationOrder { expected: u64, actual: u64 },

    #[error("decompression failed: {0}")]
    Decompress(String),

    /// The decrypted bytes are not a BSON document.
    #[error("failed to parse decrypted document: {0}")]
    DocumentParse(String),

    #[error(transparent)]
    KeyProvider(#[from] KeyProviderError),

    #[error(transparent)]
    Security(#[from] SecurityError),
}

/// Errors that stop a decrypt run.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The output stream could not be written.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),

    #[error("failed to open {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
}
