use anyhow::{Context, Result, anyhow};
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::{Arc, Mutex};

use gradeseal_handle::Handle;
use gradeseal_identity::Identity;

use super::store::{LedgerStore, OwnerKey, RecordWrite, StoredCiphertext, WriteOutcome, grant_key};

const CF_RECORDS: &str = "records";
const CF_CIPHERTEXTS: &str = "ciphertexts";
const CF_GRANTS: &str = "grants";
const CF_CONSUMED_PROOFS: &str = "consumed_proofs";

/// A thread-safe wrapper around RocksDB.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    /// Serializes record writes so the replay check and the batch are atomic.
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = vec![
            ColumnFamilyDescriptor::new(CF_RECORDS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CIPHERTEXTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_GRANTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CONSUMED_PROOFS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, families)
            .map_err(|e| anyhow!("Failed to open RocksDB: {}", e))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn read_handle(&self, key: &OwnerKey) -> Result<Option<Handle>> {
        let cf = self.db.cf_handle(CF_RECORDS).context("records CF missing")?;
        match self.db.get_cf(cf, key.to_bytes())? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .as_slice()
                    .try_into()
                    .context("invalid handle length")?;
                Ok(Some(Handle::from_bytes(arr)))
            }
            None => Ok(None),
        }
    }
}

impl LedgerStore for RocksDbStore {
    fn record(&self, key: &OwnerKey) -> Result<Option<Handle>> {
        self.read_handle(key)
    }

    fn ciphertext(&self, handle: &Handle) -> Result<Option<StoredCiphertext>> {
        let cf = self
            .db
            .cf_handle(CF_CIPHERTEXTS)
            .context("ciphertexts CF missing")?;
        match self.db.get_cf(cf, handle.as_bytes())? {
            Some(bytes) => Ok(Some(
                wincode::deserialize(&bytes).context("corrupt stored ciphertext")?,
            )),
            None => Ok(None),
        }
    }

    fn commit_write(&self, write: RecordWrite) -> Result<WriteOutcome> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("ledger write lock poisoned"))?;

        let cf_proofs = self
            .db
            .cf_handle(CF_CONSUMED_PROOFS)
            .context("consumed_proofs CF missing")?;
        if self.db.get_cf(cf_proofs, write.proof_id)?.is_some() {
            return Ok(WriteOutcome::Replayed);
        }

        let cf_records = self.db.cf_handle(CF_RECORDS).context("records CF missing")?;
        let cf_cts = self
            .db
            .cf_handle(CF_CIPHERTEXTS)
            .context("ciphertexts CF missing")?;

        let previous = self.read_handle(&write.key)?;
        let value = wincode::serialize(&write.ciphertext)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_proofs, write.proof_id, b"");
        batch.put_cf(cf_cts, write.handle.as_bytes(), value);
        batch.put_cf(cf_records, write.key.to_bytes(), write.handle.as_bytes());
        if let Some(old) = previous.filter(|old| *old != write.handle) {
            batch.delete_cf(cf_cts, old.as_bytes());
        }
        self.db.write(batch)?;

        Ok(WriteOutcome::Committed { previous })
    }

    fn insert_grant(&self, key: &OwnerKey, viewer: &Identity) -> Result<bool> {
        let cf = self.db.cf_handle(CF_GRANTS).context("grants CF missing")?;
        let k = grant_key(key, viewer);
        if self.db.get_cf(cf, k)?.is_some() {
            return Ok(false);
        }
        self.db.put_cf(cf, k, b"")?;
        Ok(true)
    }

    fn has_grant(&self, key: &OwnerKey, viewer: &Identity) -> Result<bool> {
        let cf = self.db.cf_handle(CF_GRANTS).context("grants CF missing")?;
        Ok(self.db.get_cf(cf, grant_key(key, viewer))?.is_some())
    }
}
