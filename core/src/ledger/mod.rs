//! Access-control ledger
//!
//! Holds one encrypted record per (owner, category) and the set of viewers
//! each owner has admitted. Only the writer may store records; only the owner
//! may admit viewers. Grants are permanent and survive record overwrites.

pub mod authority;
pub mod db;
pub mod events;
pub mod memory;
pub mod store;

use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use gradeseal_handle::{Category, CategoryError, EncryptedRecord, Handle};
use gradeseal_identity::Identity;
use gradeseal_privacy::SealedInput;

pub use authority::WriterAuthority;
pub use db::RocksDbStore;
pub use events::LedgerEvent;
pub use memory::MemoryStore;
pub use store::{LedgerStore, OwnerKey, RecordWrite, StoredCiphertext, WriteOutcome};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    InvalidCategory(#[from] CategoryError),
    #[error("{0} is not the authorized writer")]
    NotAuthorizedWriter(Identity),
    #[error("invalid input proof: {0}")]
    InvalidProof(String),
    #[error("malformed identity: {0}")]
    MalformedIdentity(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct AccessControlLedger {
    contract: Identity,
    authority: WriterAuthority,
    store: Arc<dyn LedgerStore>,
    events: broadcast::Sender<LedgerEvent>,
}

impl AccessControlLedger {
    pub fn new(
        contract: Identity,
        authority: WriterAuthority,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self, LedgerError> {
        if contract.is_zero() {
            return Err(LedgerError::MalformedIdentity(
                "contract must not be the zero address".into(),
            ));
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            contract,
            authority,
            store,
            events,
        })
    }

    /// Identity that encrypted inputs must be bound to.
    pub fn contract(&self) -> Identity {
        self.contract
    }

    pub fn writer(&self) -> Identity {
        self.authority.writer()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Stores `input` as the record for (`owner`, `category`), replacing any
    /// previous one. `caller` must be the writer and the input must have been
    /// produced for this contract by `caller`.
    pub fn write(
        &self,
        caller: &Identity,
        owner: Identity,
        category: u8,
        input: &SealedInput,
    ) -> Result<Handle, LedgerError> {
        let category = Category::try_from(category)?;
        if owner.is_zero() {
            return Err(LedgerError::MalformedIdentity(
                "owner must not be the zero address".into(),
            ));
        }
        if let Err(e) = self.authority.authorize(caller) {
            warn!("Rejected write to {}/{} from {}", owner, category, caller);
            return Err(e);
        }
        input.verify(&self.contract, caller).map_err(|e| {
            warn!("Rejected write to {}/{}: {}", owner, category, e);
            LedgerError::InvalidProof(e.to_string())
        })?;

        let key = OwnerKey::new(owner, category);
        let handle = input.handle();
        let write = RecordWrite {
            key,
            handle,
            ciphertext: StoredCiphertext::new(&key, &self.contract, caller, input.proof().sealed()),
            proof_id: input.proof().id(),
        };

        match self.store.commit_write(write)? {
            WriteOutcome::Replayed => {
                warn!("Rejected write to {}/{}: input proof already used", owner, category);
                Err(LedgerError::InvalidProof("input proof was already used".into()))
            }
            WriteOutcome::Committed { previous } => {
                info!(
                    "Record {}/{} set to {} (replaced: {})",
                    owner,
                    category,
                    handle,
                    previous.is_some()
                );
                let _ = self.events.send(LedgerEvent::RecordWritten {
                    owner,
                    category,
                    handle,
                });
                Ok(handle)
            }
        }
    }

    /// The current record for a slot, or the empty record.
    pub fn read(&self, owner: &Identity, category: u8) -> Result<EncryptedRecord, LedgerError> {
        let category = Category::try_from(category)?;
        let handle = self.store.record(&OwnerKey::new(*owner, category))?;
        Ok(handle.map(EncryptedRecord::populated).unwrap_or_default())
    }

    /// Lets `viewer` decrypt `caller`'s record in `category`, now and after
    /// any later overwrite. Granting twice is harmless.
    pub fn grant(&self, caller: &Identity, category: u8, viewer: Identity) -> Result<(), LedgerError> {
        let category = Category::try_from(category)?;
        if viewer.is_zero() {
            return Err(LedgerError::MalformedIdentity(
                "viewer must not be the zero address".into(),
            ));
        }

        let key = OwnerKey::new(*caller, category);
        let fresh = self.store.insert_grant(&key, &viewer)?;
        info!(
            "Viewer {} granted on {}/{}{}",
            viewer,
            caller,
            category,
            if fresh { "" } else { " (already granted)" }
        );
        let _ = self.events.send(LedgerEvent::ViewerGranted {
            owner: *caller,
            category,
            viewer,
        });
        Ok(())
    }

    pub fn is_granted(
        &self,
        owner: &Identity,
        category: u8,
        viewer: &Identity,
    ) -> Result<bool, LedgerError> {
        let category = Category::try_from(category)?;
        Ok(self.store.has_grant(&OwnerKey::new(*owner, category), viewer)?)
    }

    /// Whether `requester` may have `handle` decrypted: it must be the live
    /// record of a slot that `requester` owns or was granted.
    pub fn can_decrypt(&self, handle: &Handle, requester: &Identity) -> Result<bool, LedgerError> {
        if handle.is_empty() {
            return Ok(false);
        }
        let Some(stored) = self.store.ciphertext(handle)? else {
            return Ok(false);
        };
        let key = stored.owner_key()?;
        if self.store.record(&key)? != Some(*handle) {
            return Ok(false);
        }
        if key.owner == *requester {
            return Ok(true);
        }
        Ok(self.store.has_grant(&key, requester)?)
    }

    pub fn ciphertext(&self, handle: &Handle) -> Result<Option<StoredCiphertext>, LedgerError> {
        Ok(self.store.ciphertext(handle)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chacha20poly1305::aead::OsRng;
    use gradeseal_privacy::EncryptionPipeline;
    use x25519_dalek::{PublicKey, StaticSecret};

    const CONTRACT: Identity = Identity([0xc0; 20]);
    const WRITER: Identity = Identity([0x77; 20]);
    const OWNER: Identity = Identity([0x01; 20]);
    const VIEWER: Identity = Identity([0x02; 20]);
    const STRANGER: Identity = Identity([0x03; 20]);

    struct Fixture {
        ledger: AccessControlLedger,
        store: Arc<MemoryStore>,
        pipeline: EncryptionPipeline,
    }

    fn fixture() -> Fixture {
        let network = StaticSecret::random_from_rng(OsRng);
        let store = Arc::new(MemoryStore::new());
        let ledger = AccessControlLedger::new(
            CONTRACT,
            WriterAuthority::new(WRITER).unwrap(),
            store.clone(),
        )
        .unwrap();
        Fixture {
            ledger,
            store,
            pipeline: EncryptionPipeline::new(PublicKey::from(&network).to_bytes()),
        }
    }

    impl Fixture {
        fn input(&self, grade: i64) -> SealedInput {
            self.pipeline.encrypt_grade(grade, CONTRACT, WRITER).unwrap()
        }
    }

    #[test]
    fn test_read_unwritten_is_empty() {
        let f = fixture();
        assert_eq!(f.ledger.read(&OWNER, 1).unwrap(), EncryptedRecord::EMPTY);
    }

    #[test]
    fn test_write_then_read() {
        let f = fixture();
        let input = f.input(85);
        let handle = f.ledger.write(&WRITER, OWNER, 1, &input).unwrap();
        assert_eq!(handle, input.handle());

        let record = f.ledger.read(&OWNER, 1).unwrap();
        assert!(record.exists());
        assert_eq!(record.handle(), handle);
        assert!(!f.ledger.read(&OWNER, 2).unwrap().exists());
    }

    #[test]
    fn test_only_writer_can_write() {
        let f = fixture();
        let input = f.pipeline.encrypt_grade(85, CONTRACT, STRANGER).unwrap();
        let err = f.ledger.write(&STRANGER, OWNER, 1, &input).unwrap_err();
        assert!(matches!(err, LedgerError::NotAuthorizedWriter(id) if id == STRANGER));
        assert!(!f.ledger.read(&OWNER, 1).unwrap().exists());
    }

    #[test]
    fn test_input_bound_to_someone_else_is_rejected() {
        let f = fixture();
        let input = f.pipeline.encrypt_grade(85, CONTRACT, STRANGER).unwrap();
        let err = f.ledger.write(&WRITER, OWNER, 1, &input).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidProof(_)));

        let foreign = f.pipeline.encrypt_grade(85, Identity([9; 20]), WRITER).unwrap();
        let err = f.ledger.write(&WRITER, OWNER, 1, &foreign).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidProof(_)));
    }

    #[test]
    fn test_bad_category_and_owner() {
        let f = fixture();
        let input = f.input(85);
        assert!(matches!(
            f.ledger.write(&WRITER, OWNER, 5, &input),
            Err(LedgerError::InvalidCategory(CategoryError::OutOfRange(5)))
        ));
        assert!(matches!(
            f.ledger.write(&WRITER, Identity::ZERO, 1, &input),
            Err(LedgerError::MalformedIdentity(_))
        ));
        assert!(matches!(
            f.ledger.read(&OWNER, 9),
            Err(LedgerError::InvalidCategory(_))
        ));
        assert!(matches!(
            f.ledger.grant(&OWNER, 9, VIEWER),
            Err(LedgerError::InvalidCategory(_))
        ));
    }

    #[test]
    fn test_replayed_input_is_rejected() {
        let f = fixture();
        let input = f.input(85);
        f.ledger.write(&WRITER, OWNER, 1, &input).unwrap();
        let err = f.ledger.write(&WRITER, OWNER, 2, &input).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidProof(_)));
        assert!(!f.ledger.read(&OWNER, 2).unwrap().exists());
    }

    #[test]
    fn test_overwrite_retires_old_handle() {
        let f = fixture();
        let first = f.ledger.write(&WRITER, OWNER, 1, &f.input(60)).unwrap();
        let second = f.ledger.write(&WRITER, OWNER, 1, &f.input(90)).unwrap();
        assert_ne!(first, second);
        assert_eq!(f.ledger.read(&OWNER, 1).unwrap().handle(), second);
        assert!(f.ledger.ciphertext(&first).unwrap().is_none());
        assert_eq!(f.store.ciphertext_count(), 1);
        assert!(!f.ledger.can_decrypt(&first, &OWNER).unwrap());
        assert!(f.ledger.can_decrypt(&second, &OWNER).unwrap());
    }

    #[test]
    fn test_grant_scopes_decryption() {
        let f = fixture();
        let math = f.ledger.write(&WRITER, OWNER, 1, &f.input(85)).unwrap();
        let history = f.ledger.write(&WRITER, OWNER, 3, &f.input(70)).unwrap();

        assert!(!f.ledger.can_decrypt(&math, &VIEWER).unwrap());
        f.ledger.grant(&OWNER, 1, VIEWER).unwrap();
        assert!(f.ledger.can_decrypt(&math, &VIEWER).unwrap());
        assert!(!f.ledger.can_decrypt(&history, &VIEWER).unwrap());
        assert!(!f.ledger.can_decrypt(&math, &STRANGER).unwrap());
        assert!(!f.ledger.can_decrypt(&Handle::EMPTY, &OWNER).unwrap());
    }

    #[test]
    fn test_grant_survives_overwrite() {
        let f = fixture();
        f.ledger.write(&WRITER, OWNER, 1, &f.input(50)).unwrap();
        f.ledger.grant(&OWNER, 1, VIEWER).unwrap();
        let updated = f.ledger.write(&WRITER, OWNER, 1, &f.input(95)).unwrap();
        assert!(f.ledger.is_granted(&OWNER, 1, &VIEWER).unwrap());
        assert!(f.ledger.can_decrypt(&updated, &VIEWER).unwrap());
    }

    #[test]
    fn test_grant_before_any_write() {
        let f = fixture();
        f.ledger.grant(&OWNER, 4, VIEWER).unwrap();
        let handle = f.ledger.write(&WRITER, OWNER, 4, &f.input(99)).unwrap();
        assert!(f.ledger.can_decrypt(&handle, &VIEWER).unwrap());
    }

    #[test]
    fn test_grant_is_per_owner() {
        let f = fixture();
        let handle = f.ledger.write(&WRITER, OWNER, 1, &f.input(85)).unwrap();
        // A third party granting on "their own" slot does not reach OWNER's record.
        f.ledger.grant(&STRANGER, 1, VIEWER).unwrap();
        assert!(!f.ledger.can_decrypt(&handle, &VIEWER).unwrap());
    }

    #[test]
    fn test_events() {
        let f = fixture();
        let mut rx = f.ledger.subscribe();
        let handle = f.ledger.write(&WRITER, OWNER, 2, &f.input(85)).unwrap();
        f.ledger.grant(&OWNER, 2, VIEWER).unwrap();
        f.ledger.grant(&OWNER, 2, VIEWER).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            LedgerEvent::RecordWritten {
                owner: OWNER,
                category: Category::Science,
                handle
            }
        );
        let granted = LedgerEvent::ViewerGranted {
            owner: OWNER,
            category: Category::Science,
            viewer: VIEWER,
        };
        assert_eq!(rx.try_recv().unwrap(), granted);
        assert_eq!(rx.try_recv().unwrap(), granted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejected_write_emits_nothing() {
        let f = fixture();
        let mut rx = f.ledger.subscribe();
        let input = f.input(85);
        let _ = f.ledger.write(&STRANGER, OWNER, 1, &input);
        assert!(rx.try_recv().is_err());
    }
}
