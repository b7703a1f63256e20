// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! TTLV (Tag-Type-Length-Value) encoding.
//!
//! Every item is an 8-byte prefix (3-byte tag, 1-byte type, 4-byte
//! big-endian length) followed by the value, padded with zeros to a
//! multiple of 8 bytes. Structures contain a sequence of items and their
//! length covers the padded children.

use tokio::io::{AsyncRead, AsyncReadExt};
use zeroize::Zeroize;

use super::error::KmipError;
use super::types::{ItemType, Tag};

/// Size of the tag/type/length prefix.
pub const TTLV_HEADER_SIZE: usize = 8;

/// Maximum structure nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 16;

/// Default upper bound for one response message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// A decoded TTLV value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Structure(Vec<Ttlv>),
    Integer(i32),
    LongInteger(i64),
    /// Big-endian two's complement, length a multiple of 8.
    BigInteger(Vec<u8>),
    Enumeration(u32),
    Boolean(bool),
    TextString(String),
    ByteString(Vec<u8>),
    /// Seconds since the Unix epoch.
    DateTime(i64),
    Interval(u32),
    /// Microseconds since the Unix epoch.
    DateTimeExtended(i64),
}

impl Value {
    pub fn item_type(&self) -> ItemType {
        match self {
            Value::Structure(_) => ItemType::Structure,
            Value::Integer(_) => ItemType::Integer,
            Value::LongInteger(_) => ItemType::LongInteger,
            Value::BigInteger(_) => ItemType::BigInteger,
            Value::Enumeration(_) => ItemType::Enumeration,
            Value::Boolean(_) => ItemType::Boolean,
            Value::TextString(_) => ItemType::TextString,
            Value::ByteString(_) => ItemType::ByteString,
            Value::DateTime(_) => ItemType::DateTime,
            Value::Interval(_) => ItemType::Interval,
            Value::DateTimeExtended(_) => ItemType::DateTimeExtended,
        }
    }
}

/// One TTLV item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ttlv {
    pub tag: Tag,
    pub value: Value,
}

impl Ttlv {
    pub fn new(tag: Tag, value: Value) -> Self {
        Self { tag, value }
    }

    pub fn structure(tag: Tag, children: Vec<Ttlv>) -> Self {
        Self::new(tag, Value::Structure(children))
    }

    pub fn integer(tag: Tag, value: i32) -> Self {
        Self::new(tag, Value::Integer(value))
    }

    pub fn enumeration(tag: Tag, value: u32) -> Self {
        Self::new(tag, Value::Enumeration(value))
    }

    pub fn text(tag: Tag, value: impl Into<String>) -> Self {
        Self::new(tag, Value::TextString(value.into()))
    }

    pub fn bytes(tag: Tag, value: impl Into<Vec<u8>>) -> Self {
        Self::new(tag, Value::ByteString(value.into()))
    }

    /// Returns the children if this item is a structure.
    pub fn as_structure(&self) -> Option<&[Ttlv]> {
        match &self.value {
            Value::Structure(children) => Some(children),
            _ => None,
        }
    }

    /// First child with the given tag.
    pub fn child(&self, tag: Tag) -> Option<&Ttlv> {
        self.as_structure()?.iter().find(|c| c.tag == tag)
    }

    /// First child with the given tag, or a `MissingField` error.
    pub fn require(&self, tag: Tag, context: &'static str) -> Result<&Ttlv, KmipError> {
        self.child(tag).ok_or_else(|| KmipError::missing(tag, context))
    }

    /// All children with the given tag.
    pub fn children(&self, tag: Tag) -> impl Iterator<Item = &Ttlv> {
        self.as_structure()
            .unwrap_or_default()
            .iter()
            .filter(move |c| c.tag == tag)
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self.value {
            Value::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_enumeration(&self) -> Option<u32> {
        match self.value {
            Value::Enumeration(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::TextString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Value::ByteString(b) => Some(b),
            _ => None,
        }
    }

    /// Encodes the item, including trailing padding.
    pub fn encode(&self) -> Result<Vec<u8>, KmipError> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), KmipError> {
        if self.tag.0 > 0x00FF_FFFF {
            return Err(KmipError::Encode(format!("tag {} wider than 3 bytes", self.tag)));
        }

        buf.extend_from_slice(&self.tag.0.to_be_bytes()[1..]);
        buf.push(self.value.item_type() as u8);

        let length_at = buf.len();
        buf.extend_from_slice(&[0u8; 4]);
        let value_at = buf.len();

        match &self.value {
            Value::Structure(children) => {
                for child in children {
                    child.encode_into(buf)?;
                }
            }
            Value::Integer(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::LongInteger(v) | Value::DateTime(v) | Value::DateTimeExtended(v) => {
                buf.extend_from_slice(&v.to_be_bytes())
            }
            Value::BigInteger(v) => {
                if v.is_empty() || v.len() % 8 != 0 {
                    return Err(KmipError::Encode(format!(
                        "big integer length {} is not a positive multiple of 8",
                        v.len()
                    )));
                }
                buf.extend_from_slice(v)
            }
            Value::Enumeration(v) | Value::Interval(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::Boolean(v) => buf.extend_from_slice(&u64::from(*v).to_be_bytes()),
            Value::TextString(v) => buf.extend_from_slice(v.as_bytes()),
            Value::ByteString(v) => buf.extend_from_slice(v),
        }

        let length = buf.len() - value_at;
        let length = u32::try_from(length)
            .map_err(|_| KmipError::Encode(format!("item {} too long: {}", self.tag, length)))?;
        buf[length_at..value_at].copy_from_slice(&length.to_be_bytes());

        buf.resize(buf.len() + padding(length as usize), 0);
        Ok(())
    }

    /// Decodes exactly one item occupying all of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Ttlv, KmipError> {
        let (item, consumed) = decode_item(bytes, 0)?;
        if consumed != bytes.len() {
            return Err(KmipError::Decode(format!(
                "{} trailing bytes after item {}",
                bytes.len() - consumed,
                item.tag
            )));
        }
        Ok(item)
    }
}

fn padding(length: usize) -> usize {
    (8 - length % 8) % 8
}

fn fixed<const N: usize>(value: &[u8], tag: Tag) -> Result<[u8; N], KmipError> {
    value.try_into().map_err(|_| {
        KmipError::Decode(format!(
            "item {} has length {}, expected {}",
            tag,
            value.len(),
            N
        ))
    })
}

fn decode_item(buf: &[u8], depth: usize) -> Result<(Ttlv, usize), KmipError> {
    if depth > MAX_DEPTH {
        return Err(KmipError::Decode(format!(
            "structure nesting exceeds {}",
            MAX_DEPTH
        )));
    }
    if buf.len() < TTLV_HEADER_SIZE {
        return Err(KmipError::Decode(format!(
            "need {} header bytes, have {}",
            TTLV_HEADER_SIZE,
            buf.len()
        )));
    }

    let tag = Tag(u32::from_be_bytes([0, buf[0], buf[1], buf[2]]));
    let item_type = ItemType::try_from(buf[3])
        .map_err(|t| KmipError::Decode(format!("item {} has unknown type 0x{:02X}", tag, t)))?;
    let length = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;

    let padded = length
        .checked_add(padding(length))
        .ok_or_else(|| KmipError::Decode(format!("item {} length overflow", tag)))?;
    let available = buf.len() - TTLV_HEADER_SIZE;
    if padded > available {
        return Err(KmipError::Decode(format!(
            "item {} needs {} bytes, have {}",
            tag, padded, available
        )));
    }

    let raw = &buf[TTLV_HEADER_SIZE..TTLV_HEADER_SIZE + length];

    let value = match item_type {
        ItemType::Structure => {
            let mut children = Vec::new();
            let mut offset = 0;
            while offset < raw.len() {
                let (child, used) = decode_item(&raw[offset..], depth + 1)?;
                children.push(child);
                offset += used;
            }
            Value::Structure(children)
        }
        ItemType::Integer => Value::Integer(i32::from_be_bytes(fixed(raw, tag)?)),
        ItemType::LongInteger => Value::LongInteger(i64::from_be_bytes(fixed(raw, tag)?)),
        ItemType::BigInteger => {
            if raw.is_empty() || raw.len() % 8 != 0 {
                return Err(KmipError::Decode(format!(
                    "big integer {} has length {}",
                    tag,
                    raw.len()
                )));
            }
            Value::BigInteger(raw.to_vec())
        }
        ItemType::Enumeration => Value::Enumeration(u32::from_be_bytes(fixed(raw, tag)?)),
        ItemType::Boolean => match u64::from_be_bytes(fixed(raw, tag)?) {
            0 => Value::Boolean(false),
            1 => Value::Boolean(true),
            other => {
                return Err(KmipError::Decode(format!(
                    "boolean {} has value {}",
                    tag, other
                )))
            }
        },
        ItemType::TextString => Value::TextString(
            String::from_utf8(raw.to_vec())
                .map_err(|_| KmipError::Decode(format!("text string {} is not UTF-8", tag)))?,
        ),
        ItemType::ByteString => Value::ByteString(raw.to_vec()),
        ItemType::DateTime => Value::DateTime(i64::from_be_bytes(fixed(raw, tag)?)),
        ItemType::Interval => Value::Interval(u32::from_be_bytes(fixed(raw, tag)?)),
        ItemType::DateTimeExtended => {
            Value::DateTimeExtended(i64::from_be_bytes(fixed(raw, tag)?))
        }
    };

    Ok((Ttlv { tag, value }, TTLV_HEADER_SIZE + padded))
}

/// Reads one complete TTLV message from `reader`.
///
/// The length prefix is checked against `max_size` before the body is
/// buffered.
pub async fn read_message<R>(reader: &mut R, max_size: usize) -> Result<Ttlv, KmipError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; TTLV_HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let length = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let body_len = length + padding(length);
    if body_len > max_size {
        return Err(KmipError::ResponseTooLarge {
            size: body_len,
            limit: max_size,
        });
    }

    let mut message = vec![0u8; TTLV_HEADER_SIZE + body_len];
    message[..TTLV_HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[TTLV_HEADER_SIZE..]).await?;

    let decoded = Ttlv::decode(&message);
    message.zeroize();
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_integer_padding() {
        let item = Ttlv::integer(Tag::BATCH_COUNT, 1);
        let bytes = item.encode().unwrap();
        assert_eq!(
            bytes,
            vec![
                0x42, 0x00, 0x0D, 0x02, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x00,
                0x00, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_encode_text_padding() {
        let item = Ttlv::text(Tag::UNIQUE_IDENTIFIER, "1");
        let bytes = item.encode().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
        assert_eq!(bytes[8], b'1');
        assert!(bytes[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_structure_length() {
        let item = Ttlv::structure(
            Tag::PROTOCOL_VERSION,
            vec![
                Ttlv::integer(Tag::PROTOCOL_VERSION_MAJOR, 1),
                Ttlv::integer(Tag::PROTOCOL_VERSION_MINOR, 2),
            ],
        );
        let bytes = item.encode().unwrap();
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[0..4], &[0x42, 0x00, 0x69, 0x01]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 32]);
    }

    #[test]
    fn test_decode_known_message() {
        // Protocol Version 1.0 as it appears in the KMIP test vectors.
        let bytes = [
            0x42, 0x00, 0x69, 0x01, 0x00, 0x00, 0x00, 0x20, 0x42, 0x00, 0x6A, 0x02, 0x00, 0x00,
            0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x42, 0x00, 0x6B, 0x02,
            0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let item = Ttlv::decode(&bytes).unwrap();
        assert_eq!(item.tag, Tag::PROTOCOL_VERSION);
        assert_eq!(
            item.child(Tag::PROTOCOL_VERSION_MAJOR).and_then(Ttlv::as_integer),
            Some(1)
        );
        assert_eq!(
            item.child(Tag::PROTOCOL_VERSION_MINOR).and_then(Ttlv::as_integer),
            Some(0)
        );
    }

    #[test]
    fn test_all_value_types_roundtrip() {
        let item = Ttlv::structure(
            Tag::RESPONSE_PAYLOAD,
            vec![
                Ttlv::integer(Tag::CRYPTOGRAPHIC_LENGTH, -256),
                Ttlv::new(Tag::TIME_STAMP, Value::LongInteger(i64::MIN)),
                Ttlv::new(Tag::KEY_MATERIAL, Value::BigInteger(vec![0xFF; 16])),
                Ttlv::enumeration(Tag::OBJECT_TYPE, 2),
                Ttlv::new(Tag::ATTRIBUTE_VALUE, Value::Boolean(true)),
                Ttlv::text(Tag::UNIQUE_IDENTIFIER, "key-1234567"),
                Ttlv::bytes(Tag::DATA, vec![1, 2, 3]),
                Ttlv::new(Tag::TIME_STAMP, Value::DateTime(1_647_253_664)),
                Ttlv::new(Tag::ATTRIBUTE_VALUE, Value::Interval(86_400)),
                Ttlv::new(Tag::TIME_STAMP, Value::DateTimeExtended(1_647_253_664_552_000)),
            ],
        );
        let bytes = item.encode().unwrap();
        assert_eq!(bytes.len() % 8, 0);
        assert_eq!(Ttlv::decode(&bytes).unwrap(), item);
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = Ttlv::text(Tag::UNIQUE_IDENTIFIER, "abcdef").encode().unwrap();
        for len in 0..bytes.len() {
            assert!(Ttlv::decode(&bytes[..len]).is_err(), "len {}", len);
        }
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = Ttlv::integer(Tag::BATCH_COUNT, 1).encode().unwrap();
        bytes.extend_from_slice(&[0u8; 8]);
        assert!(matches!(Ttlv::decode(&bytes), Err(KmipError::Decode(_))));
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut bytes = Ttlv::integer(Tag::BATCH_COUNT, 1).encode().unwrap();
        bytes[3] = 0x0F;
        assert!(matches!(Ttlv::decode(&bytes), Err(KmipError::Decode(_))));
    }

    #[test]
    fn test_decode_bad_integer_length() {
        let mut bytes = Ttlv::integer(Tag::BATCH_COUNT, 1).encode().unwrap();
        bytes[7] = 8;
        assert!(matches!(Ttlv::decode(&bytes), Err(KmipError::Decode(_))));
    }

    #[test]
    fn test_decode_invalid_boolean() {
        let mut bytes = Ttlv::new(Tag::ATTRIBUTE_VALUE, Value::Boolean(true))
            .encode()
            .unwrap();
        bytes[15] = 2;
        assert!(matches!(Ttlv::decode(&bytes), Err(KmipError::Decode(_))));
    }

    #[test]
    fn test_decode_depth_limit() {
        let mut item = Ttlv::integer(Tag::BATCH_COUNT, 1);
        for _ in 0..=MAX_DEPTH {
            item = Ttlv::structure(Tag::BATCH_ITEM, vec![item]);
        }
        let bytes = item.encode().unwrap();
        assert!(matches!(Ttlv::decode(&bytes), Err(KmipError::Decode(_))));
    }

    #[test]
    fn test_children_filter() {
        let item = Ttlv::structure(
            Tag::TEMPLATE_ATTRIBUTE,
            vec![
                Ttlv::text(Tag::ATTRIBUTE_NAME, "a"),
                Ttlv::integer(Tag::BATCH_COUNT, 1),
                Ttlv::text(Tag::ATTRIBUTE_NAME, "b"),
            ],
        );
        let names: Vec<_> = item
            .children(Tag::ATTRIBUTE_NAME)
            .filter_map(Ttlv::as_text)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(Ttlv::integer(Tag::BATCH_COUNT, 1)
            .children(Tag::ATTRIBUTE_NAME)
            .next()
            .is_none());
    }

    #[tokio::test]
    async fn test_read_message() {
        let item = Ttlv::structure(
            Tag::RESPONSE_MESSAGE,
            vec![Ttlv::bytes(Tag::KEY_MATERIAL, vec![9u8; 32])],
        );
        let mut bytes = item.encode().unwrap();
        bytes.extend_from_slice(b"next message");

        let mut reader = &bytes[..];
        let decoded = read_message(&mut reader, DEFAULT_MAX_MESSAGE_SIZE)
            .await
            .unwrap();
        assert_eq!(decoded, item);
        assert_eq!(reader, b"next message");
    }

    #[tokio::test]
    async fn test_read_message_too_large() {
        let item = Ttlv::bytes(Tag::DATA, vec![0u8; 64]);
        let bytes = item.encode().unwrap();
        let mut reader = &bytes[..];
        let result = read_message(&mut reader, 32).await;
        assert!(matches!(
            result,
            Err(KmipError::ResponseTooLarge { size: 64, limit: 32 })
        ));
    }

    #[tokio::test]
    async fn test_read_message_eof() {
        let bytes = Ttlv::bytes(Tag::DATA, vec![0u8; 64]).encode().unwrap();
        let mut reader = &bytes[..40];
        assert!(matches!(
            read_message(&mut reader, DEFAULT_MAX_MESSAGE_SIZE).await,
            Err(KmipError::Io(_))
        ));
    }
}
