use chacha20poly1305::aead::OsRng;
use ed25519_dalek::{Signer, SigningKey};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use gradeseal_identity::{Identity, Signature};
use gradeseal_transaction::{LedgerCall, SignedCall};
use gradeseal_typed_data::{Domain, StructuredSigner, TypedDataError, TypedMessage, signing_digest};

#[derive(Debug, Error)]
pub enum KeypairError {
    #[error("keypair file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("keypair file {0} already exists")]
    Exists(String),
    #[error("keypair file {0} is not a JSON array of 32 seed bytes")]
    Format(String),
}

/// A user's signing key. NEVER expose this struct's internals.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn new_random() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn to_seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The address this key acts as.
    pub fn identity(&self) -> Identity {
        Identity::from_verifying_key(&self.verifying_key())
    }

    pub fn verifying_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Signs a ledger call for the deployment at (`contract`, `chain_id`).
    pub fn sign_call(&self, call: LedgerCall, contract: &Identity, chain_id: u64) -> SignedCall {
        let digest = call.signing_digest(contract, chain_id);
        SignedCall {
            call,
            signer_pubkey: self.verifying_key(),
            signature: Signature(self.signing_key.sign(&digest).to_bytes()),
        }
    }

    /// Reads a key file: a JSON array holding the 32-byte seed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KeypairError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| KeypairError::Io {
            path: display.clone(),
            source,
        })?;
        let bytes: Vec<u8> =
            serde_json::from_str(&raw).map_err(|_| KeypairError::Format(display.clone()))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeypairError::Format(display))?;
        Ok(Self::from_seed(&seed))
    }

    /// Writes the key file with owner-only permissions. Never overwrites.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), KeypairError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let io_err = |source: std::io::Error| KeypairError::Io {
            path: display.clone(),
            source,
        };

        if path.exists() {
            return Err(KeypairError::Exists(display.clone()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string(&self.to_seed().to_vec())
            .map_err(|_| KeypairError::Format(display.clone()))?;

        let mut f = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(io_err)?;

        #[cfg(unix)]
        {
            // chmod 600 (rw-------)
            let mut perms = f.metadata().map_err(io_err)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms).map_err(io_err)?;
        }

        f.write_all(json.as_bytes()).map_err(io_err)?;
        Ok(())
    }
}

impl StructuredSigner for Keypair {
    fn identity(&self) -> Identity {
        Keypair::identity(self)
    }

    fn verifying_key(&self) -> [u8; 32] {
        Keypair::verifying_key(self)
    }

    fn sign_structured<M: TypedMessage>(
        &self,
        domain: &Domain,
        message: &M,
    ) -> Result<Signature, TypedDataError> {
        let digest = signing_digest(domain, message);
        Ok(Signature(self.signing_key.sign(&digest).to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradeseal_typed_data::{UserDecryptAuthorization, verify_structured};
    use tempfile::TempDir;

    #[test]
    fn test_seed_is_deterministic() {
        let a = Keypair::from_seed(&[1u8; 32]);
        let b = Keypair::from_seed(&[1u8; 32]);
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), Keypair::from_seed(&[2u8; 32]).identity());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys").join("id.json");
        let key = Keypair::new_random();
        key.write_file(&path).unwrap();

        let loaded = Keypair::from_file(&path).unwrap();
        assert_eq!(loaded.identity(), key.identity());

        assert!(matches!(key.write_file(&path), Err(KeypairError::Exists(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("id.json");
        Keypair::new_random().write_file(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("id.json");
        fs::write(&path, "[1,2,3]").unwrap();
        assert!(matches!(Keypair::from_file(&path), Err(KeypairError::Format(_))));
    }

    #[test]
    fn test_signed_call_verifies() {
        let key = Keypair::new_random();
        let contract = Identity([3; 20]);
        let call = key.sign_call(
            LedgerCall::AllowViewer {
                category: 0,
                viewer: Identity([4; 20]),
            },
            &contract,
            1,
        );
        assert_eq!(call.verify(&contract, 1), Ok(key.identity()));
    }

    #[test]
    fn test_structured_signature_verifies() {
        let key = Keypair::new_random();
        let domain = Domain::decryption(1, Identity([3; 20]));
        let msg = UserDecryptAuthorization::new([5; 32], [Identity([3; 20])], 1, 100, 10);
        let sig = key.sign_structured(&domain, &msg).unwrap();
        assert!(verify_structured(&domain, &msg, &sig, &key.verifying_key()).is_ok());
    }
}
