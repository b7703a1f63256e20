// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Validated view of a header line.

use bson::DateTime;

use crate::keyproviders::{RawKeyStoreIdentifier, WrappedLek, ENCRYPTED_LEK_OFFSET, WRAP_TAG_OFFSET};

use super::compression::CompressionMode;
use super::error::LineError;
use super::line::AuditLogLine;

/// A header that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub ts: DateTime,
    pub version: String,
    pub compression_mode: CompressionMode,
    pub key_store_identifier: RawKeyStoreIdentifier,
    encrypted_key: Vec<u8>,
    pub mac: String,
}

fn missing(field: &'static str) -> LineError {
    LineError::HeaderValidation {
        field,
        reason: "missing".into(),
    }
}

/// Checks that every field a header needs is present and valid.
pub fn validate_header_fields(line: &AuditLogLine) -> Result<(), LineError> {
    if line.ts.is_none() {
        return Err(missing("ts"));
    }
    if line.version.as_deref().unwrap_or_default().is_empty() {
        return Err(missing("version"));
    }
    match line.compression_mode.as_deref() {
        None | Some("") => return Err(missing("compressionMode")),
        Some(mode) if CompressionMode::parse(mode).is_none() => {
            return Err(LineError::HeaderValidation {
                field: "compressionMode",
                reason: format!("unsupported value {}", mode),
            })
        }
        Some(_) => {}
    }
    if line
        .key_store_identifier
        .provider
        .as_deref()
        .unwrap_or_default()
        .is_empty()
    {
        return Err(missing("keyStoreIdentifier.provider"));
    }
    if line.encrypted_key.as_ref().map_or(true, Vec::is_empty) {
        return Err(missing("encryptedKey"));
    }
    if line.mac.as_deref().unwrap_or_default().is_empty() {
        return Err(missing("MAC"));
    }
    Ok(())
}

impl HeaderRecord {
    pub fn from_line(line: &AuditLogLine) -> Result<Self, LineError> {
        validate_header_fields(line)?;

        let encrypted_key = line.encrypted_key.clone().unwrap_or_default();
        if encrypted_key.len() < WRAP_TAG_OFFSET {
            return Err(LineError::EncryptedKeyTooShort {
                got: encrypted_key.len(),
                min: WRAP_TAG_OFFSET,
            });
        }

        let compression_mode = line
            .compression_mode
            .as_deref()
            .and_then(CompressionMode::parse)
            .ok_or_else(|| missing("compressionMode"))?;

        Ok(Self {
            ts: line.ts.ok_or_else(|| missing("ts"))?,
            version: line.version.clone().unwrap_or_default(),
            compression_mode,
            key_store_identifier: line.key_store_identifier.clone(),
            encrypted_key,
            mac: line.mac.clone().unwrap_or_default(),
        })
    }

    pub fn iv(&self) -> &[u8] {
        &self.encrypted_key[..ENCRYPTED_LEK_OFFSET]
    }

    pub fn encrypted_lek(&self) -> &[u8] {
        &self.encrypted_key[ENCRYPTED_LEK_OFFSET..WRAP_TAG_OFFSET]
    }

    pub fn wrap_tag(&self) -> &[u8] {
        &self.encrypted_key[WRAP_TAG_OFFSET..]
    }

    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    pub fn wrapped_lek(&self) -> Result<WrappedLek<'_>, LineError> {
        Ok(WrappedLek::new(&self.encrypted_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decryption::line::AuditRecordType;

    fn header() -> AuditLogLine {
        AuditLogLine {
            ts: Some(DateTime::from_millis(1_700_000_000_000)),
            audit_record_type: AuditRecordType::Header,
            version: Some("0.0".into()),
            compression_mode: Some("none".into()),
            key_store_identifier: RawKeyStoreIdentifier {
                provider: Some("local".into()),
                filename: Some("localKey".into()),
                ..Default::default()
            },
            encrypted_key: Some((0u8..64).collect()),
            mac: Some("mac".into()),
            log: None,
        }
    }

    #[test]
    fn test_header_slices() {
        let record = HeaderRecord::from_line(&header()).unwrap();
        assert_eq!(record.compression_mode, CompressionMode::None);
        assert_eq!(record.iv(), &(0u8..16).collect::<Vec<_>>()[..]);
        assert_eq!(record.encrypted_lek(), &(16u8..48).collect::<Vec<_>>()[..]);
        assert_eq!(record.wrap_tag(), &(48u8..64).collect::<Vec<_>>()[..]);
        assert_eq!(record.wrapped_lek().unwrap().iv(), record.iv());
    }

    #[test]
    fn test_each_missing_field_is_named() {
        let cases: [(&str, fn(&mut AuditLogLine)); 6] = [
            ("ts", |l| l.ts = None),
            ("version", |l| l.version = None),
            ("compressionMode", |l| l.compression_mode = None),
            ("keyStoreIdentifier.provider", |l| {
                l.key_store_identifier.provider = None
            }),
            ("encryptedKey", |l| l.encrypted_key = None),
            ("MAC", |l| l.mac = Some(String::new())),
        ];

        for (expected, strip) in cases {
            let mut line = header();
            strip(&mut line);
            match HeaderRecord::from_line(&line) {
                Err(LineError::HeaderValidation { field, .. }) => assert_eq!(field, expected),
                other => panic!("{}: unexpected {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_unknown_compression_mode() {
        let mut line = header();
        line.compression_mode = Some("snappy".into());
        let err = HeaderRecord::from_line(&line).unwrap_err();
        assert!(err.to_string().contains("snappy"));
    }

    #[test]
    fn test_short_encrypted_key_rejected() {
        for len in [1usize, 16, 47] {
            let mut line = header();
            line.encrypted_key = Some(vec![0u8; len]);
            assert!(matches!(
                HeaderRecord::from_line(&line),
                Err(LineError::EncryptedKeyTooShort { got, min: 48 }) if got == len
            ));
        }
    }
}
