//! Encrypted inputs
//!
//! An input is a sealed 32-bit value plus a proof tying it to the contract
//! that will store it and the identity that submits it. The ledger rejects
//! an input presented by anyone else, or for any other contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};

use gradeseal_handle::Handle;
use gradeseal_identity::Identity;

use crate::encryption::{SealError, SealedBox};

pub const MAX_GRADE: u32 = 100;

/// Width of the encrypted value in bytes.
const VALUE_WIDTH: usize = 4;

const INPUT_LABEL: &[u8] = b"gradeseal-input-v1";
const HANDLE_CONTEXT: &str = "gradeseal 2025-01 input handle v1";
const BINDING_CONTEXT: &str = "gradeseal 2025-01 input binding v1";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("value {value} is outside {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("invalid input proof: {0}")]
    InvalidProof(&'static str),
    #[error(transparent)]
    Seal(#[from] SealError),
}

/// Proof material that accompanies a handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputProof {
    sealed: SealedBox,
    #[serde(with = "hex::serde")]
    binding: [u8; 32],
}

impl InputProof {
    pub fn sealed(&self) -> &SealedBox {
        &self.sealed
    }

    /// Stable identifier of this proof, used to refuse a second use of it.
    pub fn id(&self) -> [u8; 32] {
        self.binding
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedInput {
    handle: Handle,
    proof: InputProof,
}

impl SealedInput {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn proof(&self) -> &InputProof {
        &self.proof
    }

    /// Checks that this input was produced for `contract` by `submitter`.
    pub fn verify(&self, contract: &Identity, submitter: &Identity) -> Result<(), InputError> {
        if self.handle.is_empty() {
            return Err(InputError::InvalidProof("empty handle"));
        }
        if self.proof.sealed.plaintext_len() != VALUE_WIDTH {
            return Err(InputError::InvalidProof("ciphertext does not fit a 32-bit value"));
        }
        if compute_handle(contract, submitter, &self.proof.sealed) != self.handle {
            return Err(InputError::InvalidProof(
                "handle is not bound to this contract and submitter",
            ));
        }
        if compute_binding(&self.handle, contract, submitter, &self.proof.sealed)
            != self.proof.binding
        {
            return Err(InputError::InvalidProof("binding digest mismatch"));
        }
        Ok(())
    }
}

/// Encrypts values under the network public key.
#[derive(Clone, Debug)]
pub struct EncryptionPipeline {
    network_pk: PublicKey,
}

impl EncryptionPipeline {
    pub fn new(network_pk: [u8; 32]) -> Self {
        Self {
            network_pk: PublicKey::from(network_pk),
        }
    }

    pub fn network_public_key(&self) -> [u8; 32] {
        self.network_pk.to_bytes()
    }

    /// Seals any unsigned 32-bit value for `contract`, to be submitted by `submitter`.
    pub fn encrypt_for_submission(
        &self,
        value: i64,
        contract: Identity,
        submitter: Identity,
    ) -> Result<SealedInput, InputError> {
        let plaintext = u32::try_from(value).map_err(|_| InputError::OutOfRange {
            value,
            min: 0,
            max: u32::MAX as i64,
        })?;

        let aad = input_aad(&contract, &submitter);
        let sealed = SealedBox::seal(&plaintext.to_le_bytes(), &self.network_pk, INPUT_LABEL, &aad)?;

        let handle = compute_handle(&contract, &submitter, &sealed);
        if handle.is_empty() {
            return Err(InputError::Seal(SealError::Encryption));
        }
        let binding = compute_binding(&handle, &contract, &submitter, &sealed);

        Ok(SealedInput {
            handle,
            proof: InputProof { sealed, binding },
        })
    }

    /// Like `encrypt_for_submission`, restricted to grades in `0..=MAX_GRADE`.
    pub fn encrypt_grade(
        &self,
        grade: i64,
        contract: Identity,
        submitter: Identity,
    ) -> Result<SealedInput, InputError> {
        if !(0..=MAX_GRADE as i64).contains(&grade) {
            return Err(InputError::OutOfRange {
                value: grade,
                min: 0,
                max: MAX_GRADE as i64,
            });
        }
        self.encrypt_for_submission(grade, contract, submitter)
    }
}

/// Recovers the value of a sealed input with the network secret.
pub fn open_value(
    sealed: &SealedBox,
    network_sk: &StaticSecret,
    contract: &Identity,
    submitter: &Identity,
) -> Result<u32, InputError> {
    let plaintext = sealed.open(network_sk, INPUT_LABEL, &input_aad(contract, submitter))?;
    let bytes: [u8; VALUE_WIDTH] = plaintext
        .as_slice()
        .try_into()
        .map_err(|_| InputError::InvalidProof("ciphertext does not fit a 32-bit value"))?;
    Ok(u32::from_le_bytes(bytes))
}

fn input_aad(contract: &Identity, submitter: &Identity) -> [u8; 40] {
    let mut aad = [0u8; 40];
    aad[..20].copy_from_slice(contract.as_bytes());
    aad[20..].copy_from_slice(submitter.as_bytes());
    aad
}

fn compute_handle(contract: &Identity, submitter: &Identity, sealed: &SealedBox) -> Handle {
    let mut hasher = blake3::Hasher::new_derive_key(HANDLE_CONTEXT);
    hasher.update(contract.as_bytes());
    hasher.update(submitter.as_bytes());
    sealed.absorb(&mut hasher);
    Handle::from_bytes(*hasher.finalize().as_bytes())
}

fn compute_binding(
    handle: &Handle,
    contract: &Identity,
    submitter: &Identity,
    sealed: &SealedBox,
) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(BINDING_CONTEXT);
    hasher.update(handle.as_bytes());
    hasher.update(contract.as_bytes());
    hasher.update(submitter.as_bytes());
    sealed.absorb(&mut hasher);
    *hasher.finalize().as_bytes()
}
