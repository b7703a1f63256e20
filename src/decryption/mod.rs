// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Audit log decryption.
//!
//! An audit log is a sequence of sections. Each section starts with a
//! header carrying a log encryption key (LEK) wrapped by a key provider,
//! followed by log records encrypted with AES-256-GCM under that LEK.
//!
//! # Example
//!
//! ```no_run
//! use audit_decrypt::decryption::{Decryptor, WriterSink};
//! use audit_decrypt::keyproviders::KeyProviderOpts;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let opts = KeyProviderOpts::new().with_local_key_file("/etc/mongodb/localKey");
//! let mut sink = WriterSink::new(std::io::stdout().lock());
//! let summary = Decryptor::new(opts)
//!     .decrypt_file("auditLog.bson".as_ref(), &mut sink)
//!     .await?;
//! println!("{} documents", summary.documents);
//! # Ok(())
//! # }
//! ```

mod compression;
mod error;
mod header;
mod line;
mod log_record;
mod output;
mod pipeline;
mod scanner;

#[cfg(test)]
pub(crate) mod testing;

pub use compression::CompressionMode;
pub use error::{DecryptError, LineError, ScanError};
pub use header::{validate_header_fields, HeaderRecord};
pub use line::{AuditLogLine, AuditRecordType};
pub use log_record::{
    EncryptedLogRecord, KEY_INIT_COUNT_SIZE, KEY_INVOCATION_COUNT_SIZE, LOG_RECORD_MIN_SIZE,
    LOG_TAG_SIZE,
};
pub use output::{to_relaxed_json, MemorySink, OutputEntry, OutputSink, WriterSink};
pub use pipeline::{DecryptSection, DecryptSummary, Decryptor, HEADER_MISSING};
pub use scanner::{detect_format, AuditLogFormat, AuditLogScanner, MAX_DOCUMENT_SIZE};
