// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The decrypt pipeline.
//!
//! Lines are processed in order. A header unwraps a fresh LEK and opens a
//! section; each following log record must carry the next key invocation
//! count and is decrypted, decompressed and parsed. Line failures go to the
//! sink and the scan continues; only stream and output failures stop it.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use bson::Document;
use tracing::{debug, info, instrument, warn};

use crate::keyproviders::{
    CredentialPrompt, KeyProviderError, KeyProviderOpts, KeyStoreIdentifier, NonInteractivePrompt,
    RawKeyStoreIdentifier,
};
use crate::security::SecretBytes;

use super::compression::CompressionMode;
use super::error::{DecryptError, LineError};
use super::header::HeaderRecord;
use super::line::AuditLogLine;
use super::log_record::EncryptedLogRecord;
use super::output::OutputSink;
use super::scanner::AuditLogScanner;

/// Warning for a log record with no open section.
pub const HEADER_MISSING: &str = "header missing or corrupted, skipping log record";

/// State of one header-to-header span. The LEK is zeroized when the
/// section is dropped.
#[derive(Debug)]
pub struct DecryptSection {
    lek: SecretBytes,
    compression_mode: CompressionMode,
    processed: u64,
}

impl DecryptSection {
    pub fn new(lek: SecretBytes, compression_mode: CompressionMode) -> Self {
        Self {
            lek,
            compression_mode,
            processed: 0,
        }
    }

    pub fn compression_mode(&self) -> CompressionMode {
        self.compression_mode
    }

    /// Log records seen in this section, including failed ones.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Decrypts the section's next log record.
    ///
    /// The expected invocation count advances even when the record fails,
    /// so one bad record does not misalign the rest of the section.
    pub fn decrypt_record(&mut self, line: &AuditLogLine) -> Result<Document, LineError> {
        self.processed += 1;

        let record = EncryptedLogRecord::decode(line)?;
        if record.key_invocation_count() != self.processed {
            return Err(LineError::InvocationOrder {
                expected: self.processed,
                actual: record.key_invocation_count(),
            });
        }

        let payload = record.decrypt(self.lek.as_bytes())?;
        let plaintext = self.compression_mode.decompress(&payload)?;
        Document::from_reader(plaintext.as_slice())
            .map_err(|e| LineError::DocumentParse(e.to_string()))
    }
}

/// Counts of what a run reported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecryptSummary {
    /// Records returned by the scanner.
    pub lines: u64,
    pub headers: u64,
    pub documents: u64,
    pub warnings: u64,
    pub errors: u64,
}

/// Decrypts audit logs with providers configured from `KeyProviderOpts`.
///
/// A validated provider is kept across headers with an identical key store
/// identifier, within and across runs.
pub struct Decryptor {
    opts: KeyProviderOpts,
    prompt: Box<dyn CredentialPrompt>,
    provider: Option<(RawKeyStoreIdentifier, KeyStoreIdentifier)>,
}

impl Decryptor {
    /// A decryptor that never prompts.
    pub fn new(opts: KeyProviderOpts) -> Self {
        Self {
            opts,
            prompt: Box::new(NonInteractivePrompt),
            provider: None,
        }
    }

    pub fn with_prompt(mut self, prompt: Box<dyn CredentialPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub async fn decrypt_file<S>(
        &mut self,
        path: &Path,
        sink: &mut S,
    ) -> Result<DecryptSummary, DecryptError>
    where
        S: OutputSink + ?Sized,
    {
        let file = File::open(path).map_err(|source| DecryptError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.decrypt(file, sink).await
    }

    #[instrument(skip_all)]
    pub async fn decrypt<R, S>(
        &mut self,
        reader: R,
        sink: &mut S,
    ) -> Result<DecryptSummary, DecryptError>
    where
        R: Read + Seek,
        S: OutputSink + ?Sized,
    {
        let mut scanner = AuditLogScanner::new(reader)?;
        info!(format = %scanner.format(), "Decrypting audit log");

        let mut summary = DecryptSummary::default();
        let mut section: Option<DecryptSection> = None;

        while scanner.scan() {
            let line_number = scanner.line_number();
            summary.lines += 1;

            let line = match scanner.audit_log_line() {
                Ok(line) => line,
                Err(e) => {
                    // A corrupt header still ends the previous section.
                    if AuditLogLine::declares_header(scanner.bytes(), scanner.format()) {
                        summary.headers += 1;
                        section = None;
                    }
                    report_error(sink, &mut summary, line_number, &e)?;
                    continue;
                }
            };

            if line.is_header() {
                summary.headers += 1;
                // Zeroize the previous LEK before unwrapping the next one.
                section = None;
                match self.open_section(&line).await {
                    Ok(opened) => {
                        debug!(line = line_number, compression = %opened.compression_mode, "Opened section");
                        section = Some(opened);
                    }
                    Err(e) => report_error(sink, &mut summary, line_number, &e)?,
                }
                continue;
            }

            let Some(active) = section.as_mut() else {
                warn!(line = line_number, "Log record without a header");
                sink.warning(line_number, HEADER_MISSING)
                    .map_err(DecryptError::Output)?;
                summary.warnings += 1;
                continue;
            };

            match active.decrypt_record(&line) {
                Ok(document) => {
                    sink.document(line_number, document)
                        .map_err(DecryptError::Output)?;
                    summary.documents += 1;
                }
                Err(e) => report_error(sink, &mut summary, line_number, &e)?,
            }
        }
        drop(section);

        if let Some(err) = scanner.take_err() {
            return Err(err.into());
        }

        info!(
            lines = summary.lines,
            documents = summary.documents,
            warnings = summary.warnings,
            errors = summary.errors,
            "Audit log decrypted"
        );
        Ok(summary)
    }

    async fn open_section(&mut self, line: &AuditLogLine) -> Result<DecryptSection, LineError> {
        let header = HeaderRecord::from_line(line)?;
        let provider = self
            .validated_provider(&header.key_store_identifier)
            .await?;
        let wrapped = header.wrapped_lek()?;
        let lek = provider.as_provider().decrypt_key(&wrapped).await?;
        Ok(DecryptSection::new(lek, header.compression_mode))
    }

    async fn validated_provider(
        &mut self,
        raw: &RawKeyStoreIdentifier,
    ) -> Result<&KeyStoreIdentifier, KeyProviderError> {
        let reuse = self
            .provider
            .as_ref()
            .is_some_and(|(cached, _)| cached == raw);

        if reuse {
            debug!("Reusing validated key provider");
        } else {
            self.provider = None;
            let mut identifier = KeyStoreIdentifier::resolve(raw, &self.opts)?;
            identifier
                .as_provider_mut()
                .validate_credentials(self.prompt.as_ref())
                .await?;
            info!(provider = %identifier.provider(), "Key provider validated");
            self.provider = Some((raw.clone(), identifier));
        }

        let (_, identifier) = self
            .provider
            .as_ref()
            .ok_or(KeyProviderError::ProviderNotSet)?;
        Ok(identifier)
    }
}

fn report_error<S: OutputSink + ?Sized>(
    sink: &mut S,
    summary: &mut DecryptSummary,
    line: u64,
    error: &LineError,
) -> Result<(), DecryptError> {
    warn!(line, error = %error, "Failed to decrypt line");
    summary.errors += 1;
    sink.error(line, error).map_err(DecryptError::Output)
}
