// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! KMIP tags, item types and enumerations used by the client.

use std::fmt;

/// A three-byte KMIP tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub u32);

impl Tag {
    pub const ATTRIBUTE: Tag = Tag(0x420008);
    pub const ATTRIBUTE_NAME: Tag = Tag(0x42000A);
    pub const ATTRIBUTE_VALUE: Tag = Tag(0x42000B);
    pub const AUTHENTICATION: Tag = Tag(0x42000C);
    pub const BATCH_COUNT: Tag = Tag(0x42000D);
    pub const BATCH_ITEM: Tag = Tag(0x42000F);
    pub const CREDENTIAL: Tag = Tag(0x420023);
    pub const CREDENTIAL_TYPE: Tag = Tag(0x420024);
    pub const CREDENTIAL_VALUE: Tag = Tag(0x420025);
    pub const CRYPTOGRAPHIC_ALGORITHM: Tag = Tag(0x420028);
    pub const CRYPTOGRAPHIC_LENGTH: Tag = Tag(0x42002A);
    pub const CRYPTOGRAPHIC_USAGE_MASK: Tag = Tag(0x42002C);
    pub const IV_COUNTER_NONCE: Tag = Tag(0x42003D);
    pub const KEY_BLOCK: Tag = Tag(0x420040);
    pub const KEY_FORMAT_TYPE: Tag = Tag(0x420042);
    pub const KEY_MATERIAL: Tag = Tag(0x420043);
    pub const KEY_VALUE: Tag = Tag(0x420045);
    pub const OBJECT_TYPE: Tag = Tag(0x420057);
    pub const OPERATION: Tag = Tag(0x42005C);
    pub const PROTOCOL_VERSION: Tag = Tag(0x420069);
    pub const PROTOCOL_VERSION_MAJOR: Tag = Tag(0x42006A);
    pub const PROTOCOL_VERSION_MINOR: Tag = Tag(0x42006B);
    pub const REQUEST_HEADER: Tag = Tag(0x420077);
    pub const REQUEST_MESSAGE: Tag = Tag(0x420078);
    pub const REQUEST_PAYLOAD: Tag = Tag(0x420079);
    pub const RESPONSE_HEADER: Tag = Tag(0x42007A);
    pub const RESPONSE_MESSAGE: Tag = Tag(0x42007B);
    pub const RESPONSE_PAYLOAD: Tag = Tag(0x42007C);
    pub const RESULT_MESSAGE: Tag = Tag(0x42007D);
    pub const RESULT_REASON: Tag = Tag(0x42007E);
    pub const RESULT_STATUS: Tag = Tag(0x42007F);
    pub const SYMMETRIC_KEY: Tag = Tag(0x42008F);
    pub const TEMPLATE_ATTRIBUTE: Tag = Tag(0x420091);
    pub const TIME_STAMP: Tag = Tag(0x420092);
    pub const UNIQUE_IDENTIFIER: Tag = Tag(0x420094);
    pub const USERNAME: Tag = Tag(0x420099);
    pub const PASSWORD: Tag = Tag(0x4200A1);
    pub const DATA: Tag = Tag(0x4200C2);
    /// KMIP 2.0 attribute container.
    pub const ATTRIBUTES: Tag = Tag(0x420125);
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X}", self.0)
    }
}

/// TTLV item type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemType {
    Structure = 0x01,
    Integer = 0x02,
    LongInteger = 0x03,
    BigInteger = 0x04,
    Enumeration = 0x05,
    Boolean = 0x06,
    TextString = 0x07,
    ByteString = 0x08,
    DateTime = 0x09,
    Interval = 0x0A,
    DateTimeExtended = 0x0B,
}

impl TryFrom<u8> for ItemType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x01 => ItemType::Structure,
            0x02 => ItemType::Integer,
            0x03 => ItemType::LongInteger,
            0x04 => ItemType::BigInteger,
            0x05 => ItemType::Enumeration,
            0x06 => ItemType::Boolean,
            0x07 => ItemType::TextString,
            0x08 => ItemType::ByteString,
            0x09 => ItemType::DateTime,
            0x0A => ItemType::Interval,
            0x0B => ItemType::DateTimeExtended,
            other => return Err(other),
        })
    }
}

/// KMIP operations issued by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Operation {
    Create = 0x01,
    Get = 0x0A,
    Encrypt = 0x1F,
    Decrypt = 0x20,
}

impl Operation {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x01 => Some(Operation::Create),
            0x0A => Some(Operation::Get),
            0x1F => Some(Operation::Encrypt),
            0x20 => Some(Operation::Decrypt),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Batch item result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Success,
    OperationFailed,
    OperationPending,
    OperationUndone,
    Unknown(u32),
}

impl From<u32> for ResultStatus {
    fn from(value: u32) -> Self {
        match value {
            0 => ResultStatus::Success,
            1 => ResultStatus::OperationFailed,
            2 => ResultStatus::OperationPending,
            3 => ResultStatus::OperationUndone,
            other => ResultStatus::Unknown(other),
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Success => f.write_str("Success"),
            ResultStatus::OperationFailed => f.write_str("Operation Failed"),
            ResultStatus::OperationPending => f.write_str("Operation Pending"),
            ResultStatus::OperationUndone => f.write_str("Operation Undone"),
            ResultStatus::Unknown(v) => write!(f, "0x{:08X}", v),
        }
    }
}

/// Object Type enumeration value for symmetric keys.
pub const OBJECT_TYPE_SYMMETRIC_KEY: u32 = 0x02;

/// Cryptographic Algorithm enumeration value for AES.
pub const CRYPTOGRAPHIC_ALGORITHM_AES: u32 = 0x03;

/// Cryptographic Usage Mask bits.
pub const USAGE_MASK_ENCRYPT: i32 = 0x04;
pub const USAGE_MASK_DECRYPT: i32 = 0x08;

/// Credential Type enumeration value for username/password.
pub const CREDENTIAL_TYPE_USERNAME_AND_PASSWORD: u32 = 0x01;

/// KMIP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: i32,
    pub minor: i32,
}

impl ProtocolVersion {
    pub const V1_0: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };
    /// First version defining Encrypt and Decrypt.
    pub const V1_2: ProtocolVersion = ProtocolVersion { major: 1, minor: 2 };
    /// Create takes an `Attributes` structure from this version on.
    pub const V2_0: ProtocolVersion = ProtocolVersion { major: 2, minor: 0 };

    pub const SUPPORTED: [ProtocolVersion; 3] = [Self::V1_0, Self::V1_2, Self::V2_0];

    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(self)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
