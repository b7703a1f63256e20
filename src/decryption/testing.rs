// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Builds encrypted audit logs for tests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bson::spec::BinarySubtype;
use bson::{doc, Binary, Bson, DateTime, Document};

use crate::security::aead::seal::{cbc_seal, gcm_seal_12};

use super::scanner::AuditLogFormat;

pub(crate) const HEADER_TS: i64 = 1_647_253_664_552;

fn binary(bytes: Vec<u8>) -> Binary {
    Binary {
        subtype: BinarySubtype::Generic,
        bytes,
    }
}

/// A header whose encrypted key is `iv || CBC(kek, iv, lek) || tag`.
pub(crate) fn local_header(kek: &[u8], lek: &[u8; 32], filename: &str, compression: &str) -> Document {
    let iv = [0x5Cu8; 16];
    let mut encrypted_key = iv.to_vec();
    encrypted_key.extend_from_slice(&cbc_seal(kek, &iv, lek));
    encrypted_key.extend_from_slice(&[0xA5; 16]);

    header(
        doc! { "provider": "local", "filename": filename },
        encrypted_key,
        compression,
    )
}

/// A header whose encrypted key is the `{iv, key}` document of the KMIP
/// `get` wrap method.
pub(crate) fn kmip_get_header(
    kek: &[u8],
    lek: &[u8; 32],
    uid: &str,
    servers: &[&str],
    port: u16,
    compression: &str,
) -> Document {
    let iv = [0x3Du8; 12];
    let (ciphertext, tag) = gcm_seal_12(kek, &iv, uid.as_bytes(), lek);
    let mut key = tag;
    key.extend_from_slice(&ciphertext);

    let mut encrypted_key = Vec::new();
    doc! { "iv": binary(iv.to_vec()), "key": binary(key) }
        .to_writer(&mut encrypted_key)
        .unwrap();

    header(
        doc! {
            "provider": "kmip",
            "uid": uid,
            "kmipServerName": servers.iter().map(|s| Bson::from(*s)).collect::<Vec<_>>(),
            "kmipPort": i32::from(port),
            "keyWrapMethod": "get",
        },
        encrypted_key,
        compression,
    )
}

pub(crate) fn header(key_store_identifier: Document, encrypted_key: Vec<u8>, compression: &str) -> Document {
    doc! {
        "ts": DateTime::from_millis(HEADER_TS),
        "version": "0.0",
        "compressionMode": compression,
        "keyStoreIdentifier": key_store_identifier,
        "encryptedKey": binary(encrypted_key),
        "MAC": "OG/VwMlpPU9ChDmHAQAAAAAAAAAAAAAA",
        "auditRecordType": "header",
    }
}

/// Seals `plaintext` as the record with the given invocation count.
pub(crate) fn log_record(
    lek: &[u8; 32],
    invocation: u64,
    ts: i64,
    plaintext: &Document,
    compression: &str,
) -> Document {
    let mut serialized = Vec::new();
    plaintext.to_writer(&mut serialized).unwrap();
    let payload = match compression {
        "zstd" => zstd::encode_all(serialized.as_slice(), 3).unwrap(),
        _ => serialized,
    };

    let mut iv = 1u32.to_le_bytes().to_vec();
    iv.extend_from_slice(&invocation.to_le_bytes());
    let (ciphertext, tag) = gcm_seal_12(lek, &iv, &ts.to_le_bytes(), &payload);

    let mut blob = tag;
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);

    doc! {
        "ts": DateTime::from_millis(ts),
        "log": STANDARD.encode(blob),
    }
}

/// Serializes records in either on-disk encoding.
pub(crate) fn encode(records: &[Document], format: AuditLogFormat) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        match format {
            AuditLogFormat::Bson => record.to_writer(&mut out).unwrap(),
            AuditLogFormat::Json => {
                let json = Bson::Document(record.clone()).into_canonical_extjson();
                out.extend_from_slice(json.to_string().as_bytes());
                out.push(b'\n');
            }
        }
    }
    out
}

/// A base64 KEK file in a temporary directory.
pub(crate) fn kek_file(kek: &[u8]) -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), format!("{}\n", STANDARD.encode(kek))).unwrap();
    file
}
