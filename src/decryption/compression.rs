// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Compression modes recorded in audit log headers.

use std::fmt;

use super::error::LineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    None,
    Zstd,
}

impl CompressionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(CompressionMode::None),
            "zstd" => Some(CompressionMode::Zstd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMode::None => "none",
            CompressionMode::Zstd => "zstd",
        }
    }

    /// Decompresses a decrypted record payload.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, LineError> {
        match self {
            CompressionMode::None => Ok(data.to_vec()),
            CompressionMode::Zstd => {
                zstd::decode_all(data).map_err(|e| LineError::Decompress(e.to_string()))
            }
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
