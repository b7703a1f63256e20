// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Encrypted log records.
//!
//! The `log` field is base64 of `tag(12) || keyInitCount(4) ||
//! keyInvocationCount(8) || ciphertext`. The GCM nonce is the two counters
//! as stored and the AAD is the record timestamp in milliseconds; all
//! integers are little-endian.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::security::{gcm_decrypt, GcmInput, SecurityError, AES_GCM_NONCE_SIZE};

use super::error::LineError;
use super::line::AuditLogLine;

pub const LOG_TAG_SIZE: usize = 12;
pub const KEY_INIT_COUNT_SIZE: usize = 4;
pub const KEY_INVOCATION_COUNT_SIZE: usize = 8;

/// Tag plus both counters.
pub const LOG_RECORD_MIN_SIZE: usize = LOG_TAG_SIZE + KEY_INIT_COUNT_SIZE + KEY_INVOCATION_COUNT_SIZE;

const IV_OFFSET: usize = LOG_TAG_SIZE;
const CIPHERTEXT_OFFSET: usize = LOG_RECORD_MIN_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedLogRecord {
    blob: Vec<u8>,
    aad: [u8; 8],
    key_init_count: u32,
    key_invocation_count: u64,
}

impl EncryptedLogRecord {
    pub fn decode(line: &AuditLogLine) -> Result<Self, LineError> {
        let ts = line.ts.ok_or(LineError::MissingLogField("ts"))?;
        let log = line.log.as_deref().ok_or(LineError::MissingLogField("log"))?;
        let blob = STANDARD
            .decode(log)
            .map_err(|e| LineError::InvalidBase64(e.to_string()))?;
        Self::from_parts(blob, ts.timestamp_millis())
    }

    pub fn from_parts(blob: Vec<u8>, ts_millis: i64) -> Result<Self, LineError> {
        if blob.len() < LOG_RECORD_MIN_SIZE {
            return Err(LineError::LogRecordTooShort {
                got: blob.len(),
                min: LOG_RECORD_MIN_SIZE,
            });
        }

        let mut init = [0u8; KEY_INIT_COUNT_SIZE];
        init.copy_from_slice(&blob[IV_OFFSET..IV_OFFSET + KEY_INIT_COUNT_SIZE]);
        let mut invocation = [0u8; KEY_INVOCATION_COUNT_SIZE];
        invocation.copy_from_slice(&blob[IV_OFFSET + KEY_INIT_COUNT_SIZE..CIPHERTEXT_OFFSET]);

        Ok(Self {
            aad: ts_millis.to_le_bytes(),
            key_init_count: u32::from_le_bytes(init),
            key_invocation_count: u64::from_le_bytes(invocation),
            blob,
        })
    }

    pub fn tag(&self) -> &[u8] {
        &self.blob[..LOG_TAG_SIZE]
    }

    /// keyInitCount followed by keyInvocationCount.
    pub fn iv(&self) -> &[u8] {
        &self.blob[IV_OFFSET..IV_OFFSET + AES_GCM_NONCE_SIZE]
    }

    pub fn aad(&self) -> &[u8; 8] {
        &self.aad
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.blob[CIPHERTEXT_OFFSET..]
    }

    pub fn key_init_count(&self) -> u32 {
        self.key_init_count
    }

    pub fn key_invocation_count(&self) -> u64 {
        self.key_invocation_count
    }

    /// Opens the record with the section's LEK.
    pub fn decrypt(&self, lek: &[u8]) -> Result<Vec<u8>, SecurityError> {
        gcm_decrypt(&GcmInput {
            key: lek,
            iv: self.iv(),
            aad: &self.aad,
            ciphertext: self.ciphertext(),
            tag: self.tag(),
        })
    }
}
