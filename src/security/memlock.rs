// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Locked, zeroizing storage for key material.
//!
//! LEKs and KEKs live in [`SecretBytes`]. The backing memory is pinned with
//! `mlock` where the platform allows it, and is zeroized and unlocked when
//! the value is dropped. A `SecretBytes` has exactly one owner; dropping it
//! is how a decrypt section ends.
//!
//! # Security Considerations
//!
//! - Locking is best effort: `ulimit -l` may be exhausted, in which case the
//!   key is still zeroized but may be paged out
//! - Locked memory is still visible to root/kernel

use tracing::debug;
use zeroize::Zeroize;

/// Errors creating a secret buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemlockError {
    /// Key material must not be empty.
    #[error("key material is empty")]
    Empty,

    #[error("memory lock failed: {0}")]
    LockFailed(String),
}

#[cfg(unix)]
fn lock_region(region: &[u8]) -> Result<(), MemlockError> {
    // SAFETY: the region is a live allocation owned by the caller.
    let rc = unsafe { libc::mlock(region.as_ptr() as *const libc::c_void, region.len()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(MemlockError::LockFailed(
            std::io::Error::last_os_error().to_string(),
        ))
    }
}

#[cfg(unix)]
fn unlock_region(region: &[u8]) {
    // SAFETY: the region was locked by `lock_region` and is still allocated.
    unsafe {
        libc::munlock(region.as_ptr() as *const libc::c_void, region.len());
    }
}

#[cfg(not(unix))]
fn lock_region(_region: &[u8]) -> Result<(), MemlockError> {
    Err(MemlockError::LockFailed("not supported on this platform".into()))
}

#[cfg(not(unix))]
fn unlock_region(_region: &[u8]) {}

/// Owned key material of any non-zero length.
///
/// Not `Clone`: copies of a key would outlive the section that owns it.
pub struct SecretBytes {
    bytes: Box<[u8]>,
    locked: bool,
}

impl SecretBytes {
    /// Copies key material into a new locked buffer.
    pub fn from_slice(src: &[u8]) -> Result<Self, MemlockError> {
        if src.is_empty() {
            return Err(MemlockError::Empty);
        }

        // Allocate and lock before copying so the key never sits in
        // unlocked memory owned by this type.
        let bytes = vec![0u8; src.len()].into_boxed_slice();
        let locked = match lock_region(&bytes) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Key memory not locked");
                false
            }
        };

        let mut secret = Self { bytes, locked };
        secret.bytes.copy_from_slice(src);
        Ok(secret)
    }

    /// Moves key material out of a vector, zeroizing the vector.
    pub fn from_vec(mut src: Vec<u8>) -> Result<Self, MemlockError> {
        let secret = Self::from_slice(&src);
        src.zeroize();
        secret
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; empty secrets cannot be constructed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the key memory is pinned.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.locked {
            unlock_region(&self.bytes);
        }
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBytes")
            .field("len", &self.len())
            .field("locked", &self.locked)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
