// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Decoding one audit log record into an [`AuditLogLine`].
//!
//! BSON records use camelCase field names (`auditRecordType`, `MAC`) while
//! JSON records use lowercase names, so fields are matched ignoring ASCII
//! case. Both encodings decode to equal values.

use bson::{Bson, DateTime, Document};

use crate::keyproviders::RawKeyStoreIdentifier;

use super::error::LineError;
use super::scanner::AuditLogFormat;

/// Whether a line opens a section or carries an encrypted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuditRecordType {
    Header,
    #[default]
    Log,
}

impl AuditRecordType {
    /// `"header"` is a header; an empty value is a log record.
    pub fn parse(value: &str) -> Result<Self, LineError> {
        match value {
            "header" => Ok(AuditRecordType::Header),
            "" => Ok(AuditRecordType::Log),
            other => Err(LineError::UnknownRecordType(other.to_string())),
        }
    }
}

/// One decoded audit log record, before classification-specific checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditLogLine {
    pub ts: Option<DateTime>,
    pub audit_record_type: AuditRecordType,
    pub version: Option<String>,
    pub compression_mode: Option<String>,
    pub key_store_identifier: RawKeyStoreIdentifier,
    pub encrypted_key: Option<Vec<u8>>,
    pub mac: Option<String>,
    pub log: Option<String>,
}

impl AuditLogLine {
    pub fn decode(raw: &[u8], format: AuditLogFormat) -> Result<Self, LineError> {
        Self::from_document(&parse_document(raw, format)?)
    }

    /// Whether a record that failed to decode still says it is a header.
    ///
    /// Only the `auditRecordType` field is looked at, so a header with a
    /// malformed field elsewhere is recognized.
    pub fn declares_header(raw: &[u8], format: AuditLogFormat) -> bool {
        let Ok(document) = parse_document(raw, format) else {
            return false;
        };
        document.iter().any(|(key, value)| {
            key.eq_ignore_ascii_case("auditrecordtype")
                && matches!(value, Bson::String(s) if s == "header")
        })
    }

    pub fn from_document(document: &Document) -> Result<Self, LineError> {
        let mut line = AuditLogLine::default();

        for (key, value) in document {
            match key.to_ascii_lowercase().as_str() {
                "ts" => line.ts = datetime_field("ts", value)?,
                "auditrecordtype" => {
                    let record_type = string_field("auditRecordType", value)?;
                    line.audit_record_type =
                        AuditRecordType::parse(record_type.as_deref().unwrap_or_default())?;
                }
                "version" => line.version = string_field("version", value)?,
                "compressionmode" => {
                    line.compression_mode = string_field("compressionMode", value)?
                }
                "keystoreidentifier" => {
                    line.key_store_identifier = key_store_identifier(value)?;
                }
                "encryptedkey" => line.encrypted_key = binary_field("encryptedKey", value)?,
                "mac" => line.mac = string_field("MAC", value)?,
                "log" => line.log = string_field("log", value)?,
                _ => {}
            }
        }

        Ok(line)
    }

    pub fn is_header(&self) -> bool {
        self.audit_record_type == AuditRecordType::Header
    }
}

fn parse_document(raw: &[u8], format: AuditLogFormat) -> Result<Document, LineError> {
    match format {
        AuditLogFormat::Json => {
            let value: serde_json::Value =
                serde_json::from_slice(raw).map_err(|e| LineError::Json(e.to_string()))?;
            match Bson::try_from(value).map_err(|e| LineError::ExtendedJson(e.to_string()))? {
                Bson::Document(document) => Ok(document),
                other => Err(LineError::ExtendedJson(format!(
                    "expected a document, got {:?}",
                    other.element_type()
                ))),
            }
        }
        AuditLogFormat::Bson => {
            Document::from_reader(raw).map_err(|e| LineError::Bson(e.to_string()))
        }
    }
}

fn invalid(field: &'static str, expected: &str, value: &Bson) -> LineError {
    LineError::InvalidField {
        field,
        reason: format!("expected {}, got {:?}", expected, value.element_type()),
    }
}

fn datetime_field(field: &'static str, value: &Bson) -> Result<Option<DateTime>, LineError> {
    match value {
        Bson::DateTime(ts) => Ok(Some(*ts)),
        Bson::Null => Ok(None),
        other => Err(invalid(field, "datetime", other)),
    }
}

fn string_field(field: &'static str, value: &Bson) -> Result<Option<String>, LineError> {
    match value {
        Bson::String(s) => Ok(Some(s.clone())),
        Bson::Null => Ok(None),
        other => Err(invalid(field, "string", other)),
    }
}

fn binary_field(field: &'static str, value: &Bson) -> Result<Option<Vec<u8>>, LineError> {
    match value {
        Bson::Binary(binary) => Ok(Some(binary.bytes.clone())),
        Bson::Null => Ok(None),
        other => Err(invalid(field, "binary", other)),
    }
}

fn integer_field(field: &'static str, value: &Bson) -> Result<Option<i64>, LineError> {
    match value {
        Bson::Int32(n) => Ok(Some(i64::from(*n))),
        Bson::Int64(n) => Ok(Some(*n)),
        Bson::Null => Ok(None),
        other => Err(invalid(field, "integer", other)),
    }
}

/// A server list recorded either as an array or as a single string.
fn string_list_field(field: &'static str, value: &Bson) -> Result<Vec<String>, LineError> {
    match value {
        Bson::Array(items) => items
            .iter()
            .map(|item| match item {
                Bson::String(s) => Ok(s.clone()),
                other => Err(invalid(field, "string", other)),
            })
            .collect(),
        Bson::String(s) => Ok(vec![s.clone()]),
        Bson::Null => Ok(Vec::new()),
        other => Err(invalid(field, "array", other)),
    }
}

fn key_store_identifier(value: &Bson) -> Result<RawKeyStoreIdentifier, LineError> {
    let document = match value {
        Bson::Document(document) => document,
        Bson::Null => return Ok(RawKeyStoreIdentifier::default()),
        other => return Err(invalid("keyStoreIdentifier", "document", other)),
    };

    let mut id = RawKeyStoreIdentifier::default();
    for (key, value) in document {
        match key.to_ascii_lowercase().as_str() {
            "provider" => id.provider = string_field("provider", value)?,
            "filename" => id.filename = string_field("filename", value)?,
            "uid" => id.uid = string_field("uid", value)?,
            "kmipservername" => id.kmip_server_name = string_list_field("kmipServerName", value)?,
            "kmipport" => id.kmip_port = integer_field("kmipPort", value)?,
            "keywrapmethod" => id.key_wrap_method = string_field("keyWrapMethod", value)?,
            "key" => id.key = string_field("key", value)?,
            "region" => id.region = string_field("region", value)?,
            "endpoint" => id.endpoint = string_field("endpoint", value)?,
            "keyname" => id.key_name = string_field("keyName", value)?,
            "environment" => id.environment = string_field("environment", value)?,
            "keyvaultendpoint" => {
                id.key_vault_endpoint = string_field("keyVaultEndpoint", value)?
            }
            "keyversion" => id.key_version = string_field("keyVersion", value)?,
            "projectid" => id.project_id = string_field("projectId", value)?,
            "location" => id.location = string_field("location", value)?,
            "keyring" => id.key_ring = string_field("keyRing", value)?,
            _ => {}
        }
    }
    Ok(id)
}
