//! Typed structured data
//!
//! Messages are signed over a digest that commits to a domain (who the
//! message is for) and to a typed struct (what it says):
//!
//! ```text
//! digest          = SHA256( 0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash )
//! domainSeparator = SHA256( SHA256(DOMAIN_TYPE) ‖ SHA256(name) ‖ SHA256(version)
//!                           ‖ chainId ‖ verifyingContract )
//! structHash      = SHA256( SHA256(M::TYPE) ‖ encoded fields )
//! ```
//!
//! Integers and addresses are encoded as 32-byte big-endian words.

use ed25519_dalek::{Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use gradeseal_identity::{Identity, Signature};

pub const DOMAIN_TYPE: &str =
    "Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const USER_DECRYPT_TYPE: &str = "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 contractsChainId,uint256 startTimestamp,uint256 durationDays)";

pub const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypedDataError {
    #[error("verifying key is not a valid ed25519 point")]
    InvalidKey,
    #[error("signature does not match the message")]
    BadSignature,
    #[error("signer refused: {0}")]
    Signer(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Identity,
}

impl Domain {
    /// The domain user-decryption authorizations are signed under.
    pub fn decryption(chain_id: u64, verifying_contract: Identity) -> Self {
        Self {
            name: "Decryption".to_string(),
            version: "1".to_string(),
            chain_id,
            verifying_contract,
        }
    }

    pub fn separator(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(Sha256::digest(DOMAIN_TYPE.as_bytes()));
        hasher.update(Sha256::digest(self.name.as_bytes()));
        hasher.update(Sha256::digest(self.version.as_bytes()));
        hasher.update(u64_word(self.chain_id));
        hasher.update(self.verifying_contract.to_word());
        hasher.finalize().into()
    }
}

/// A struct that can be signed as typed data.
pub trait TypedMessage {
    const TYPE: &'static str;

    fn encode_fields(&self, hasher: &mut Sha256);

    fn struct_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(Sha256::digest(Self::TYPE.as_bytes()));
        self.encode_fields(&mut hasher);
        hasher.finalize().into()
    }
}

/// Statement by a user that `public_key` may receive re-encrypted values of
/// `contract_addresses` for `duration_days` days from `start_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptAuthorization {
    #[serde(with = "hex::serde")]
    pub public_key: [u8; 32],
    pub contract_addresses: Vec<Identity>,
    pub contracts_chain_id: u64,
    pub start_timestamp: u64,
    pub duration_days: u32,
}

impl UserDecryptAuthorization {
    pub fn new(
        public_key: [u8; 32],
        contracts: impl IntoIterator<Item = Identity>,
        contracts_chain_id: u64,
        start_timestamp: u64,
        duration_days: u32,
    ) -> Self {
        let mut contract_addresses: Vec<Identity> = contracts.into_iter().collect();
        contract_addresses.sort();
        contract_addresses.dedup();
        Self {
            public_key,
            contract_addresses,
            contracts_chain_id,
            start_timestamp,
            duration_days,
        }
    }

    /// Last second (inclusive) at which the authorization is usable.
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days as u64 * SECONDS_PER_DAY)
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        now > self.expires_at()
    }

    pub fn covers(&self, contract: &Identity) -> bool {
        self.contract_addresses.contains(contract)
    }
}

impl TypedMessage for UserDecryptAuthorization {
    const TYPE: &'static str = USER_DECRYPT_TYPE;

    fn encode_fields(&self, hasher: &mut Sha256) {
        hasher.update(Sha256::digest(self.public_key));

        let mut addresses = Sha256::new();
        for contract in &self.contract_addresses {
            addresses.update(contract.to_word());
        }
        hasher.update(addresses.finalize());

        hasher.update(u64_word(self.contracts_chain_id));
        hasher.update(u64_word(self.start_timestamp));
        hasher.update(u64_word(self.duration_days as u64));
    }
}

pub fn signing_digest<M: TypedMessage>(domain: &Domain, message: &M) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x19, 0x01]);
    hasher.update(domain.separator());
    hasher.update(message.struct_hash());
    hasher.finalize().into()
}

/// Something that holds a signing key and can sign typed data for its identity.
pub trait StructuredSigner: Send + Sync {
    fn identity(&self) -> Identity;

    fn verifying_key(&self) -> [u8; 32];

    fn sign_structured<M: TypedMessage>(
        &self,
        domain: &Domain,
        message: &M,
    ) -> Result<Signature, TypedDataError>;
}

pub fn verify_structured<M: TypedMessage>(
    domain: &Domain,
    message: &M,
    signature: &Signature,
    verifying_key: &[u8; 32],
) -> Result<(), TypedDataError> {
    let key = VerifyingKey::from_bytes(verifying_key).map_err(|_| TypedDataError::InvalidKey)?;
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(&signing_digest(domain, message), &sig)
        .map_err(|_| TypedDataError::BadSignature)
}

fn u64_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}
