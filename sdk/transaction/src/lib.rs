use ed25519_dalek::{Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gradeseal_identity::{Identity, Signature};
use gradeseal_privacy::SealedInput;

const CALL_CONTEXT: &str = "gradeseal 2025-01 ledger call v1";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CallError {
    #[error("signer public key is not a valid ed25519 point")]
    InvalidKey,
    #[error("call signature does not verify")]
    InvalidSignature,
}

/// The state-changing operations a caller can ask the ledger to perform.
///
/// Categories travel as raw ids; the ledger validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerCall {
    SetGrade {
        owner: Identity,
        category: u8,
        input: SealedInput,
    },
    AllowViewer {
        category: u8,
        viewer: Identity,
    },
}

impl LedgerCall {
    /// The digest a caller signs. It names the target contract and chain so a
    /// call cannot be replayed against another deployment.
    pub fn signing_digest(&self, contract: &Identity, chain_id: u64) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_derive_key(CALL_CONTEXT);
        hasher.update(contract.as_bytes());
        hasher.update(&chain_id.to_le_bytes());
        match self {
            LedgerCall::SetGrade {
                owner,
                category,
                input,
            } => {
                hasher.update(&[0x01]);
                hasher.update(owner.as_bytes());
                hasher.update(&[*category]);
                hasher.update(input.handle().as_bytes());
                hasher.update(&input.proof().id());
            }
            LedgerCall::AllowViewer { category, viewer } => {
                hasher.update(&[0x02]);
                hasher.update(&[*category]);
                hasher.update(viewer.as_bytes());
            }
        }
        *hasher.finalize().as_bytes()
    }
}

/// The authenticated wrapper around a LedgerCall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    pub call: LedgerCall,
    /// The raw ed25519 public key of the signer.
    #[serde(with = "hex::serde")]
    pub signer_pubkey: [u8; 32],
    pub signature: Signature,
}

impl SignedCall {
    pub fn caller(&self) -> Identity {
        Identity::from_verifying_key(&self.signer_pubkey)
    }

    /// Verifies the signature and returns the authenticated caller.
    pub fn verify(&self, contract: &Identity, chain_id: u64) -> Result<Identity, CallError> {
        let key = VerifyingKey::from_bytes(&self.signer_pubkey).map_err(|_| CallError::InvalidKey)?;
        let sig = ed25519_dalek::Signature::from_bytes(self.signature.as_bytes());
        key.verify(&self.call.signing_digest(contract, chain_id), &sig)
            .map_err(|_| CallError::InvalidSignature)?;
        Ok(self.caller())
    }
}
