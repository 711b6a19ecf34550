use anyhow::Result;
use wincode::{SchemaRead, SchemaWrite};

use gradeseal_handle::{Category, CategoryError, Handle};
use gradeseal_identity::Identity;
use gradeseal_privacy::SealedBox;

/// One record slot: whose grade, in which subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerKey {
    pub owner: Identity,
    pub category: Category,
}

impl OwnerKey {
    pub const LEN: usize = Identity::LEN + 1;

    pub fn new(owner: Identity, category: Category) -> Self {
        Self { owner, category }
    }

    pub fn to_bytes(&self) -> [u8; 21] {
        let mut out = [0u8; 21];
        out[..Identity::LEN].copy_from_slice(self.owner.as_bytes());
        out[Identity::LEN] = self.category.id();
        out
    }
}

/// A ciphertext as the ledger keeps it, with the context needed to open it.
#[derive(Clone, Debug, PartialEq, Eq, SchemaRead, SchemaWrite)]
pub struct StoredCiphertext {
    pub owner: [u8; 20],
    pub category: u8,
    pub contract: [u8; 20],
    pub submitter: [u8; 20],
    pub ephemeral_pk: [u8; 32],
    pub nonce: [u8; 12],
    pub ciphertext: Vec<u8>,
}

impl StoredCiphertext {
    pub fn new(key: &OwnerKey, contract: &Identity, submitter: &Identity, sealed: &SealedBox) -> Self {
        Self {
            owner: key.owner.0,
            category: key.category.id(),
            contract: contract.0,
            submitter: submitter.0,
            ephemeral_pk: sealed.ephemeral_pk,
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext.clone(),
        }
    }

    pub fn owner_key(&self) -> Result<OwnerKey, CategoryError> {
        Ok(OwnerKey::new(
            Identity(self.owner),
            Category::try_from(self.category)?,
        ))
    }

    pub fn contract(&self) -> Identity {
        Identity(self.contract)
    }

    pub fn submitter(&self) -> Identity {
        Identity(self.submitter)
    }

    pub fn sealed_box(&self) -> SealedBox {
        SealedBox {
            ephemeral_pk: self.ephemeral_pk,
            nonce: self.nonce,
            ciphertext: self.ciphertext.clone(),
        }
    }
}

/// Everything a single record write changes, applied atomically.
#[derive(Clone, Debug)]
pub struct RecordWrite {
    pub key: OwnerKey,
    pub handle: Handle,
    pub ciphertext: StoredCiphertext,
    pub proof_id: [u8; 32],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed { previous: Option<Handle> },
    /// The proof was consumed by an earlier write; nothing changed.
    Replayed,
}

/// Persistence behind the ledger.
pub trait LedgerStore: Send + Sync {
    /// Current handle for a slot, if one was ever written.
    fn record(&self, key: &OwnerKey) -> Result<Option<Handle>>;

    fn ciphertext(&self, handle: &Handle) -> Result<Option<StoredCiphertext>>;

    /// Marks the proof consumed, stores the ciphertext, points the slot at the
    /// new handle and drops the ciphertext it replaced.
    fn commit_write(&self, write: RecordWrite) -> Result<WriteOutcome>;

    /// Returns true if the grant did not exist before.
    fn insert_grant(&self, key: &OwnerKey, viewer: &Identity) -> Result<bool>;

    fn has_grant(&self, key: &OwnerKey, viewer: &Identity) -> Result<bool>;
}

pub(crate) fn grant_key(key: &OwnerKey, viewer: &Identity) -> [u8; 41] {
    let mut out = [0u8; 41];
    out[..OwnerKey::LEN].copy_from_slice(&key.to_bytes());
    out[OwnerKey::LEN..].copy_from_slice(viewer.as_bytes());
    out
}
