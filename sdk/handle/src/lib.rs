//! Handles
//!
//! A handle is an opaque 32-byte reference to a ciphertext held by the
//! ledger. The all-zero handle is reserved and means "no value".

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod category;
pub use category::{Category, CategoryError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("malformed handle {0:?}: expected 0x followed by 64 hex characters")]
    Malformed(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle([u8; 32]);

impl Handle {
    pub const LEN: usize = 32;
    pub const EMPTY: Handle = Handle([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl From<[u8; 32]> for Handle {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Handle {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Handle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| HandleError::Malformed(s.to_string()))?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(digits, &mut out).map_err(|_| HandleError::Malformed(s.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}..)", hex::encode(&self.0[..6]))
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What a ledger read returns for one (owner, category) slot.
///
/// `exists == false` always comes with the empty handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    handle: Handle,
    exists: bool,
}

impl EncryptedRecord {
    pub const EMPTY: EncryptedRecord = EncryptedRecord {
        handle: Handle::EMPTY,
        exists: false,
    };

    /// A populated slot. An empty handle still yields the empty record.
    pub fn populated(handle: Handle) -> Self {
        if handle.is_empty() {
            return Self::EMPTY;
        }
        Self {
            handle,
            exists: true,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn exists(&self) -> bool {
        self.exists
    }
}

impl Default for EncryptedRecord {
    fn default() -> Self {
        Self::EMPTY
    }
}
