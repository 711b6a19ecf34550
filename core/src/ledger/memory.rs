use anyhow::Result;
use dashmap::{DashMap, DashSet};

use gradeseal_handle::Handle;
use gradeseal_identity::Identity;

use super::store::{LedgerStore, OwnerKey, RecordWrite, StoredCiphertext, WriteOutcome};

/// In-memory ledger store for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<OwnerKey, Handle>,
    ciphertexts: DashMap<Handle, StoredCiphertext>,
    grants: DashSet<(OwnerKey, Identity)>,
    consumed_proofs: DashSet<[u8; 32]>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ciphertext_count(&self) -> usize {
        self.ciphertexts.len()
    }
}

impl LedgerStore for MemoryStore {
    fn record(&self, key: &OwnerKey) -> Result<Option<Handle>> {
        Ok(self.records.get(key).map(|h| *h))
    }

    fn ciphertext(&self, handle: &Handle) -> Result<Option<StoredCiphertext>> {
        Ok(self.ciphertexts.get(handle).map(|c| c.clone()))
    }

    fn commit_write(&self, write: RecordWrite) -> Result<WriteOutcome> {
        if !self.consumed_proofs.insert(write.proof_id) {
            return Ok(WriteOutcome::Replayed);
        }

        self.ciphertexts.insert(write.handle, write.ciphertext);
        let previous = self.records.insert(write.key, write.handle);
        if let Some(old) = previous.filter(|old| *old != write.handle) {
            self.ciphertexts.remove(&old);
        }
        Ok(WriteOutcome::Committed { previous })
    }

    fn insert_grant(&self, key: &OwnerKey, viewer: &Identity) -> Result<bool> {
        Ok(self.grants.insert((*key, *viewer)))
    }

    fn has_grant(&self, key: &OwnerKey, viewer: &Identity) -> Result<bool> {
        Ok(self.grants.contains(&(*key, *viewer)))
    }
}
