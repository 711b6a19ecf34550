use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod signature;
pub use signature::Signature;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("malformed identity {0:?}: expected 0x followed by 40 hex characters")]
    Malformed(String),
}

/// A 20-byte account address, written as `0x` + 40 hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identity(pub [u8; 20]);

impl Identity {
    pub const LEN: usize = 20;
    pub const ZERO: Identity = Identity([0u8; 20]);

    /// Address of an ed25519 signer: the last 20 bytes of SHA256(verifying key).
    pub fn from_verifying_key(verifying_key: &[u8; 32]) -> Self {
        let digest = Sha256::digest(verifying_key);
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Left-padded 32-byte word, the form addresses take inside hashed structs.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdentityError::Malformed(s.to_string());
        let digits = s.strip_prefix("0x").ok_or_else(malformed)?;
        if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed());
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out).map_err(|_| malformed())?;
        Ok(Self(out))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({self})")
    }
}

impl AsRef<[u8]> for Identity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let text = "0x00000000000000000000000000000000000000aB";
        let id: Identity = text.parse().unwrap();
        assert_eq!(id.0[19], 0xab);
        assert_eq!(id.to_string(), text.to_lowercase());
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "0x",
            "00000000000000000000000000000000000000ab",
            "0x00000000000000000000000000000000000000a",
            "0x00000000000000000000000000000000000000abc",
            "0x00000000000000000000000000000000000000zz",
            "0X00000000000000000000000000000000000000ab",
        ] {
            assert!(
                matches!(bad.parse::<Identity>(), Err(IdentityError::Malformed(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_zero() {
        let zero: Identity = "0x0000000000000000000000000000000000000000".parse().unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Identity::ZERO);
    }

    #[test]
    fn test_from_verifying_key_is_stable() {
        let a = Identity::from_verifying_key(&[7u8; 32]);
        let b = Identity::from_verifying_key(&[7u8; 32]);
        let c = Identity::from_verifying_key(&[8u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let id = Identity([0x11; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Identity>("\"0x1234\"").is_err());
    }

    #[test]
    fn test_word_is_left_padded() {
        let id = Identity([0xff; 20]);
        let word = id.to_word();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], &[0xff; 20]);
    }
}
