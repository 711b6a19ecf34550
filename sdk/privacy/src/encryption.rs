//! Sealed boxes
//!
//! Encrypts a short message to an x25519 public key using ECDH +
//! ChaCha20-Poly1305.
//!
//! ```text
//! 1. Sender generates ephemeral keypair (epk, esk)
//! 2. Shared secret = ECDH(esk, recipient_pk)
//! 3. Key = HKDF-SHA256(salt = epk‖recipient_pk, ikm = shared, info = label)
//! 4. Ciphertext = ChaCha20-Poly1305(key, nonce, plaintext, aad)
//! 5. Output = (epk, nonce, ciphertext‖tag)
//! ```

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{
        Aead, KeyInit, Payload,
        rand_core::{OsRng, RngCore},
    },
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SealError {
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed: wrong key, corrupted ciphertext or mismatched associated data")]
    Decryption,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    /// Sender's ephemeral public key
    #[serde(with = "hex::serde")]
    pub ephemeral_pk: [u8; 32],
    #[serde(with = "hex::serde")]
    pub nonce: [u8; 12],
    /// Ciphertext with the 16-byte tag appended
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

impl SealedBox {
    pub const TAG_LEN: usize = 16;
    pub const OVERHEAD: usize = 32 + 12 + Self::TAG_LEN;

    pub fn seal(
        plaintext: &[u8],
        recipient_pk: &PublicKey,
        label: &[u8],
        aad: &[u8],
    ) -> Result<Self, SealError> {
        let esk = EphemeralSecret::random_from_rng(OsRng);
        let epk = PublicKey::from(&esk);
        let shared = esk.diffie_hellman(recipient_pk);
        let key = derive_key(&shared, epk.as_bytes(), recipient_pk.as_bytes(), label)
            .ok_or(SealError::Encryption)?;

        let mut nonce = [0u8; 12];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(&key.into());
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
            .map_err(|_| SealError::Encryption)?;

        Ok(Self {
            ephemeral_pk: *epk.as_bytes(),
            nonce,
            ciphertext,
        })
    }

    pub fn open(
        &self,
        recipient_sk: &StaticSecret,
        label: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, SealError> {
        let recipient_pk = PublicKey::from(recipient_sk);
        let shared = recipient_sk.diffie_hellman(&self.sender_public_key());
        self.open_with_shared(&shared, &recipient_pk, label, aad)
    }

    /// Opens with a shared secret the caller already computed, for recipients
    /// whose secret is single-use.
    pub fn open_with_shared(
        &self,
        shared: &SharedSecret,
        recipient_pk: &PublicKey,
        label: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, SealError> {
        let key = derive_key(shared, &self.ephemeral_pk, recipient_pk.as_bytes(), label)
            .ok_or(SealError::Decryption)?;
        let cipher = ChaCha20Poly1305::new(&key.into());
        cipher
            .decrypt(
                Nonce::from_slice(&self.nonce),
                Payload {
                    msg: &self.ciphertext,
                    aad,
                },
            )
            .map_err(|_| SealError::Decryption)
    }

    pub fn sender_public_key(&self) -> PublicKey {
        PublicKey::from(self.ephemeral_pk)
    }

    /// Length of the plaintext this box carries.
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(Self::TAG_LEN)
    }

    /// Feeds the canonical encoding of the box into a hasher.
    pub fn absorb(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&self.ephemeral_pk);
        hasher.update(&self.nonce);
        hasher.update(&(self.ciphertext.len() as u32).to_le_bytes());
        hasher.update(&self.ciphertext);
    }
}

fn derive_key(
    shared: &SharedSecret,
    ephemeral_pk: &[u8; 32],
    recipient_pk: &[u8; 32],
    label: &[u8],
) -> Option<[u8; 32]> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_pk);
    salt[32..].copy_from_slice(recipient_pk);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(label, &mut key).ok()?;
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABEL: &[u8] = b"gradeseal-test-v1";

    fn keypair() -> (StaticSecret, PublicKey) {
        let sk = StaticSecret::random_from_rng(OsRng);
        let pk = PublicKey::from(&sk);
        (sk, pk)
    }

    #[test]
    fn test_seal_open() {
        let (sk, pk) = keypair();
        let sealed = SealedBox::seal(b"grade", &pk, LABEL, b"aad").unwrap();
        assert_eq!(sealed.plaintext_len(), 5);
        assert_eq!(sealed.open(&sk, LABEL, b"aad").unwrap(), b"grade");
    }

    #[test]
    fn test_wrong_key_fails() {
        let (_, pk) = keypair();
        let (wrong_sk, _) = keypair();
        let sealed = SealedBox::seal(b"grade", &pk, LABEL, b"").unwrap();
        assert_eq!(sealed.open(&wrong_sk, LABEL, b""), Err(SealError::Decryption));
    }

    #[test]
    fn test_aad_and_label_are_bound() {
        let (sk, pk) = keypair();
        let sealed = SealedBox::seal(b"grade", &pk, LABEL, b"one").unwrap();
        assert!(sealed.open(&sk, LABEL, b"two").is_err());
        assert!(sealed.open(&sk, b"other-label", b"one").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let (sk, pk) = keypair();
        let mut sealed = SealedBox::seal(b"grade", &pk, LABEL, b"").unwrap();
        sealed.ciphertext[0] ^= 1;
        assert!(sealed.open(&sk, LABEL, b"").is_err());
    }

    #[test]
    fn test_sealing_is_randomized() {
        let (_, pk) = keypair();
        let a = SealedBox::seal(b"grade", &pk, LABEL, b"").unwrap();
        let b = SealedBox::seal(b"grade", &pk, LABEL, b"").unwrap();
        assert_ne!(a.ephemeral_pk, b.ephemeral_pk);
        assert_ne!(a.ciphertext, b.ciphertext);
    }
}
