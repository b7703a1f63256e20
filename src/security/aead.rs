// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Raw AES primitives shared by the key providers and record decryption.
//!
//! Audit log records are sealed with AES-GCM using a truncated 12-byte
//! tag, so GCM is exposed with a variable tag length (12..=16 bytes) and a
//! detached tag. Local key files wrap the LEK with unpadded AES-CBC.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::{U12, U13, U14, U15, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::AesGcm;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

use super::error::SecurityError;

/// Size of AES-256 keys in bytes.
pub const AES_256_KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce in bytes.
pub const AES_GCM_NONCE_SIZE: usize = 12;

/// AES block size; also the CBC IV size.
pub const AES_BLOCK_SIZE: usize = 16;

/// Key sizes accepted by the AES helpers.
pub const AES_KEY_SIZES: [usize; 3] = [16, 24, 32];

/// Inputs of one AES-GCM open operation with a detached tag.
pub struct GcmInput<'a> {
    pub key: &'a [u8],
    pub iv: &'a [u8],
    pub aad: &'a [u8],
    pub ciphertext: &'a [u8],
    pub tag: &'a [u8],
}

fn gcm_open<C>(input: &GcmInput<'_>) -> Result<Vec<u8>, SecurityError>
where
    C: KeyInit + AeadInPlace,
{
    let cipher = C::new_from_slice(input.key).map_err(|_| SecurityError::InvalidKeyLength {
        expected: &AES_KEY_SIZES,
        got: input.key.len(),
    })?;

    let mut buffer = input.ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(input.iv),
            input.aad,
            &mut buffer,
            GenericArray::from_slice(input.tag),
        )
        .map_err(|_| SecurityError::GcmDecrypt("message authentication failed".into()))?;

    Ok(buffer)
}

macro_rules! gcm_open_for_tag {
    ($aes:ty, $input:expr) => {
        match $input.tag.len() {
            12 => gcm_open::<AesGcm<$aes, U12, U12>>($input),
            13 => gcm_open::<AesGcm<$aes, U12, U13>>($input),
            14 => gcm_open::<AesGcm<$aes, U12, U14>>($input),
            15 => gcm_open::<AesGcm<$aes, U12, U15>>($input),
            16 => gcm_open::<AesGcm<$aes, U12, U16>>($input),
            n => Err(SecurityError::InvalidTagLength(n)),
        }
    };
}

/// Decrypts and authenticates an AES-GCM ciphertext.
///
/// The tag length is taken from `input.tag` and must be 12..=16 bytes.
/// No plaintext is returned unless the tag verifies.
pub fn gcm_decrypt(input: &GcmInput<'_>) -> Result<Vec<u8>, SecurityError> {
    if input.iv.len() != AES_GCM_NONCE_SIZE {
        return Err(SecurityError::InvalidIvLength {
            expected: AES_GCM_NONCE_SIZE,
            got: input.iv.len(),
        });
    }

    match input.key.len() {
        16 => gcm_open_for_tag!(Aes128, input),
        24 => gcm_open_for_tag!(Aes192, input),
        32 => gcm_open_for_tag!(Aes256, input),
        n => Err(SecurityError::InvalidKeyLength {
            expected: &AES_KEY_SIZES,
            got: n,
        }),
    }
}

fn cbc_open<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SecurityError>
where
    C: BlockDecryptMut + KeyIvInit,
{
    let decryptor = C::new_from_slices(key, iv)
        .map_err(|_| SecurityError::AesDecrypt("invalid key or IV length".into()))?;

    let mut buffer = ciphertext.to_vec();
    let len = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| SecurityError::AesDecrypt("malformed ciphertext".into()))?
        .len();
    buffer.truncate(len);
    Ok(buffer)
}

/// Decrypts an unpadded AES-CBC ciphertext.
pub fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SecurityError> {
    if iv.len() != AES_BLOCK_SIZE {
        return Err(SecurityError::InvalidIvLength {
            expected: AES_BLOCK_SIZE,
            got: iv.len(),
        });
    }
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(SecurityError::AesDecrypt(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            AES_BLOCK_SIZE
        )));
    }

    match key.len() {
        16 => cbc_open::<cbc::Decryptor<Aes128>>(key, iv, ciphertext),
        24 => cbc_open::<cbc::Decryptor<Aes192>>(key, iv, ciphertext),
        32 => cbc_open::<cbc::Decryptor<Aes256>>(key, iv, ciphertext),
        n => Err(SecurityError::InvalidKeyLength {
            expected: &AES_KEY_SIZES,
            got: n,
        }),
    }
}

/// Sealing counterparts used to build encrypted fixtures in tests.
#[cfg(test)]
pub(crate) mod seal {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    /// AES-256-GCM with a 12-byte tag; returns (ciphertext, tag).
    pub(crate) fn gcm_seal_12(
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let cipher = AesGcm::<Aes256, U12, U12>::new_from_slice(key).unwrap();
        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(iv), aad, &mut buffer)
            .unwrap();
        (buffer, tag.to_vec())
    }

    /// AES-256-GCM with a 16-byte tag; returns (ciphertext, tag).
    pub(crate) fn gcm_seal_16(
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let cipher = AesGcm::<Aes256, U12, U16>::new_from_slice(key).unwrap();
        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(iv), aad, &mut buffer)
            .unwrap();
        (buffer, tag.to_vec())
    }

    /// Unpadded AES-256-CBC.
    pub(crate) fn cbc_seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let encryptor = cbc::Encryptor::<Aes256>::new_from_slices(key, iv).unwrap();
        let mut buffer = plaintext.to_vec();
        let len = buffer.len();
        encryptor
            .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
            .unwrap();
        buffer
    }
}
