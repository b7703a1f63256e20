// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! KMIP request construction and response parsing.

use zeroize::Zeroizing;

use super::error::KmipError;
use super::ttlv::{Ttlv, Value};
use super::types::{
    Operation, ProtocolVersion, ResultStatus, Tag, CREDENTIAL_TYPE_USERNAME_AND_PASSWORD,
    CRYPTOGRAPHIC_ALGORITHM_AES, OBJECT_TYPE_SYMMETRIC_KEY, USAGE_MASK_DECRYPT,
    USAGE_MASK_ENCRYPT,
};

/// Username/password credential sent in the request header.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Request header fields shared by every request from one client.
#[derive(Debug, Clone)]
pub struct RequestHeader {
    pub version: ProtocolVersion,
    pub authentication: Option<Credentials>,
}

impl RequestHeader {
    fn to_ttlv(&self) -> Ttlv {
        let mut fields = vec![Ttlv::structure(
            Tag::PROTOCOL_VERSION,
            vec![
                Ttlv::integer(Tag::PROTOCOL_VERSION_MAJOR, self.version.major),
                Ttlv::integer(Tag::PROTOCOL_VERSION_MINOR, self.version.minor),
            ],
        )];

        if let Some(credentials) = &self.authentication {
            fields.push(Ttlv::structure(
                Tag::AUTHENTICATION,
                vec![Ttlv::structure(
                    Tag::CREDENTIAL,
                    vec![
                        Ttlv::enumeration(
                            Tag::CREDENTIAL_TYPE,
                            CREDENTIAL_TYPE_USERNAME_AND_PASSWORD,
                        ),
                        Ttlv::structure(
                            Tag::CREDENTIAL_VALUE,
                            vec![
                                Ttlv::text(Tag::USERNAME, credentials.username.as_str()),
                                Ttlv::text(Tag::PASSWORD, credentials.password.as_str()),
                            ],
                        ),
                    ],
                )],
            ));
        }

        fields.push(Ttlv::integer(Tag::BATCH_COUNT, 1));
        Ttlv::structure(Tag::REQUEST_HEADER, fields)
    }
}

/// Operation-specific request payloads.
pub enum RequestPayload<'a> {
    Get {
        unique_identifier: &'a str,
    },
    /// Create an AES key usable for encrypt and decrypt.
    Create {
        length: i32,
    },
    Encrypt {
        unique_identifier: &'a str,
        data: &'a [u8],
    },
    Decrypt {
        unique_identifier: &'a str,
        data: &'a [u8],
        iv_counter_nonce: &'a [u8],
    },
}

impl RequestPayload<'_> {
    pub fn operation(&self) -> Operation {
        match self {
            RequestPayload::Get { .. } => Operation::Get,
            RequestPayload::Create { .. } => Operation::Create,
            RequestPayload::Encrypt { .. } => Operation::Encrypt,
            RequestPayload::Decrypt { .. } => Operation::Decrypt,
        }
    }

    fn to_ttlv(&self, version: ProtocolVersion) -> Ttlv {
        let fields = match self {
            RequestPayload::Get { unique_identifier } => {
                vec![Ttlv::text(Tag::UNIQUE_IDENTIFIER, *unique_identifier)]
            }
            RequestPayload::Create { length } => vec![
                Ttlv::enumeration(Tag::OBJECT_TYPE, OBJECT_TYPE_SYMMETRIC_KEY),
                create_attributes(version, *length),
            ],
            RequestPayload::Encrypt {
                unique_identifier,
                data,
            } => vec![
                Ttlv::text(Tag::UNIQUE_IDENTIFIER, *unique_identifier),
                Ttlv::bytes(Tag::DATA, data.to_vec()),
            ],
            RequestPayload::Decrypt {
                unique_identifier,
                data,
                iv_counter_nonce,
            } => vec![
                Ttlv::text(Tag::UNIQUE_IDENTIFIER, *unique_identifier),
                Ttlv::bytes(Tag::DATA, data.to_vec()),
                Ttlv::bytes(Tag::IV_COUNTER_NONCE, iv_counter_nonce.to_vec()),
            ],
        };
        Ttlv::structure(Tag::REQUEST_PAYLOAD, fields)
    }
}

/// KMIP 2.0 carries attributes directly in an `Attributes` structure;
/// 1.x wraps named attributes in a `Template-Attribute`.
fn create_attributes(version: ProtocolVersion, length: i32) -> Ttlv {
    let usage_mask = USAGE_MASK_ENCRYPT | USAGE_MASK_DECRYPT;

    if version >= ProtocolVersion::V2_0 {
        return Ttlv::structure(
            Tag::ATTRIBUTES,
            vec![
                Ttlv::enumeration(Tag::CRYPTOGRAPHIC_ALGORITHM, CRYPTOGRAPHIC_ALGORITHM_AES),
                Ttlv::integer(Tag::CRYPTOGRAPHIC_LENGTH, length),
                Ttlv::integer(Tag::CRYPTOGRAPHIC_USAGE_MASK, usage_mask),
            ],
        );
    }

    let attribute = |name: &str, value: Value| {
        Ttlv::structure(
            Tag::ATTRIBUTE,
            vec![
                Ttlv::text(Tag::ATTRIBUTE_NAME, name),
                Ttlv::new(Tag::ATTRIBUTE_VALUE, value),
            ],
        )
    };

    Ttlv::structure(
        Tag::TEMPLATE_ATTRIBUTE,
        vec![
            attribute(
                "Cryptographic Algorithm",
                Value::Enumeration(CRYPTOGRAPHIC_ALGORITHM_AES),
            ),
            attribute("Cryptographic Length", Value::Integer(length)),
            attribute("Cryptographic Usage Mask", Value::Integer(usage_mask)),
        ],
    )
}

/// Builds a single-item request message.
pub fn build_request(header: &RequestHeader, payload: &RequestPayload<'_>) -> Ttlv {
    Ttlv::structure(
        Tag::REQUEST_MESSAGE,
        vec![
            header.to_ttlv(),
            Ttlv::structure(
                Tag::BATCH_ITEM,
                vec![
                    Ttlv::enumeration(Tag::OPERATION, payload.operation() as u32),
                    payload.to_ttlv(header.version),
                ],
            ),
        ],
    )
}

/// Checks the first batch item of a response and returns its payload.
///
/// A non-success result status becomes `RequestFailed` carrying the
/// server's result message.
pub fn parse_response(message: &Ttlv, operation: Operation) -> Result<&Ttlv, KmipError> {
    if message.tag != Tag::RESPONSE_MESSAGE {
        return Err(KmipError::UnexpectedResponse {
            operation,
            reason: format!("expected response message, got {}", message.tag),
        });
    }

    let item = message.require(Tag::BATCH_ITEM, "response message")?;

    let status = item
        .require(Tag::RESULT_STATUS, "batch item")?
        .as_enumeration()
        .map(ResultStatus::from)
        .ok_or_else(|| KmipError::UnexpectedResponse {
            operation,
            reason: "result status is not an enumeration".into(),
        })?;

    if status != ResultStatus::Success {
        let message = item
            .child(Tag::RESULT_MESSAGE)
            .and_then(Ttlv::as_text)
            .unwrap_or_default()
            .to_string();
        return Err(KmipError::RequestFailed {
            operation,
            status,
            message,
        });
    }

    if let Some(op) = item.child(Tag::OPERATION).and_then(Ttlv::as_enumeration) {
        if op != operation as u32 {
            return Err(KmipError::UnexpectedResponse {
                operation,
                reason: format!("response is for operation 0x{:02X}", op),
            });
        }
    }

    item.require(Tag::RESPONSE_PAYLOAD, "batch item")
}

fn text_field(payload: &Ttlv, tag: Tag, context: &'static str) -> Result<String, KmipError> {
    payload
        .require(tag, context)?
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| KmipError::Decode(format!("{} in {} is not a text string", tag, context)))
}

fn bytes_field<'a>(
    payload: &'a Ttlv,
    tag: Tag,
    context: &'static str,
) -> Result<&'a [u8], KmipError> {
    payload
        .require(tag, context)?
        .as_bytes()
        .ok_or_else(|| KmipError::Decode(format!("{} in {} is not a byte string", tag, context)))
}

/// Raw key material of a symmetric key returned by Get.
pub struct GetResponse {
    pub unique_identifier: String,
    pub key_material: Zeroizing<Vec<u8>>,
}

impl GetResponse {
    pub fn from_payload(payload: &Ttlv) -> Result<Self, KmipError> {
        let unique_identifier = text_field(payload, Tag::UNIQUE_IDENTIFIER, "get response")?;

        let object_type = payload
            .require(Tag::OBJECT_TYPE, "get response")?
            .as_enumeration();
        if object_type != Some(OBJECT_TYPE_SYMMETRIC_KEY) {
            return Err(KmipError::UnexpectedResponse {
                operation: Operation::Get,
                reason: format!("object type {:?} is not a symmetric key", object_type),
            });
        }

        let key_value = payload
            .require(Tag::SYMMETRIC_KEY, "get response")?
            .require(Tag::KEY_BLOCK, "symmetric key")?
            .require(Tag::KEY_VALUE, "key block")?;

        if key_value.as_structure().is_none() {
            return Err(KmipError::UnexpectedResponse {
                operation: Operation::Get,
                reason: "key value is wrapped".into(),
            });
        }

        let key_material = bytes_field(key_value, Tag::KEY_MATERIAL, "key value")?;

        Ok(Self {
            unique_identifier,
            key_material: Zeroizing::new(key_material.to_vec()),
        })
    }
}

impl std::fmt::Debug for GetResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetResponse")
            .field("unique_identifier", &self.unique_identifier)
            .field("key_material", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResponse {
    pub unique_identifier: String,
}

impl CreateResponse {
    pub fn from_payload(payload: &Ttlv) -> Result<Self, KmipError> {
        Ok(Self {
            unique_identifier: text_field(payload, Tag::UNIQUE_IDENTIFIER, "create response")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptResponse {
    pub unique_identifier: String,
    pub data: Vec<u8>,
    /// Present when the server generated the IV.
    pub iv_counter_nonce: Option<Vec<u8>>,
}

impl EncryptResponse {
    pub fn from_payload(payload: &Ttlv) -> Result<Self, KmipError> {
        Ok(Self {
            unique_identifier: text_field(payload, Tag::UNIQUE_IDENTIFIER, "encrypt response")?,
            data: bytes_field(payload, Tag::DATA, "encrypt response")?.to_vec(),
            iv_counter_nonce: payload
                .child(Tag::IV_COUNTER_NONCE)
                .and_then(Ttlv::as_bytes)
                .map(<[u8]>::to_vec),
        })
    }
}

pub struct DecryptResponse {
    pub unique_identifier: String,
    pub data: Zeroizing<Vec<u8>>,
}

impl DecryptResponse {
    pub fn from_payload(payload: &Ttlv) -> Result<Self, KmipError> {
        Ok(Self {
            unique_identifier: text_field(payload, Tag::UNIQUE_IDENTIFIER, "decrypt response")?,
            data: Zeroizing::new(bytes_field(payload, Tag::DATA, "decrypt response")?.to_vec()),
        })
    }
}

impl std::fmt::Debug for DecryptResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptResponse")
            .field("unique_identifier", &self.unique_identifier)
            .field("data", &"[REDACTED]")
            .finish()
    }
}
