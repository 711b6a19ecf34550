//! Ledger and decryption flow exercised together, in process.

use std::sync::Arc;
use std::thread;

use chacha20poly1305::aead::OsRng;
use tempfile::TempDir;
use x25519_dalek::{PublicKey, StaticSecret};

use gradeseal_core::ledger::{
    AccessControlLedger, LedgerError, LedgerStore, MemoryStore, RocksDbStore, WriterAuthority,
};
use gradeseal_core::oracle::{DecryptionService, LocalOracle, OraclePolicy};
use gradeseal_handle::{Category, Handle};
use gradeseal_identity::Identity;
use gradeseal_keypair::Keypair;
use gradeseal_privacy::{EncryptionPipeline, SealedInput};
use gradeseal_reader::{
    AuthorizationGrant, DecryptError, DecryptPolicy, DecryptionFlow, DecryptionOracle,
    ManualClock, OracleError,
};
use gradeseal_typed_data::{Domain, SECONDS_PER_DAY};

const CONTRACT: Identity = Identity([0x5e; 20]);
const CHAIN: u64 = 31337;
const NOW: u64 = 1_750_000_000;

struct Deployment {
    ledger: Arc<AccessControlLedger>,
    service: Arc<DecryptionService>,
    clock: ManualClock,
    writer: Keypair,
    alice: Keypair,
    bob: Keypair,
}

impl Deployment {
    fn new() -> Self {
        let writer = Keypair::new_random();
        let ledger = Arc::new(
            AccessControlLedger::new(
                CONTRACT,
                WriterAuthority::new(writer.identity()).unwrap(),
                Arc::new(MemoryStore::new()),
            )
            .unwrap(),
        );
        let clock = ManualClock::new(NOW);
        let service = Arc::new(DecryptionService::new(
            ledger.clone(),
            StaticSecret::random_from_rng(OsRng),
            Domain::decryption(CHAIN, CONTRACT),
            Arc::new(clock.clone()),
            OraclePolicy::default(),
        ));
        Self {
            ledger,
            service,
            clock,
            writer,
            alice: Keypair::new_random(),
            bob: Keypair::new_random(),
        }
    }

    fn seal(&self, grade: i64, submitter: &Keypair) -> SealedInput {
        EncryptionPipeline::new(self.service.network_public_key())
            .encrypt_grade(grade, CONTRACT, submitter.identity())
            .unwrap()
    }

    fn set_grade(&self, owner: &Keypair, category: u8, grade: i64) -> Result<Handle, LedgerError> {
        let input = self.seal(grade, &self.writer);
        self.ledger
            .write(&self.writer.identity(), owner.identity(), category, &input)
    }

    fn flow(&self) -> DecryptionFlow<LocalOracle, ManualClock> {
        DecryptionFlow::new(
            LocalOracle::new(self.service.clone()),
            self.clock.clone(),
            self.service.domain().clone(),
            CONTRACT,
            DecryptPolicy::default(),
        )
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn write_gating() {
    let d = Deployment::new();
    let math = Category::Mathematics.id();

    // Outsider with a well-formed input of their own
    let input = d.seal(80, &d.bob);
    let err = d
        .ledger
        .write(&d.bob.identity(), d.alice.identity(), math, &input)
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotAuthorizedWriter(who) if who == d.bob.identity()));
    assert!(!d.ledger.read(&d.alice.identity(), math).unwrap().exists());

    let handle = d.set_grade(&d.alice, math, 80).unwrap();
    assert_eq!(d.ledger.read(&d.alice.identity(), math).unwrap().handle(), handle);
}

#[test]
fn read_before_write_is_empty() {
    let d = Deployment::new();
    for category in Category::ALL {
        let record = d.ledger.read(&d.alice.identity(), category.id()).unwrap();
        assert!(!record.exists());
        assert!(record.handle().is_empty());
    }
}

#[test]
fn grants_only_accumulate() {
    let d = Deployment::new();
    let alice = d.alice.identity();
    let bob = d.bob.identity();

    d.ledger.grant(&alice, 1, bob).unwrap();
    d.ledger.grant(&alice, 1, bob).unwrap();
    d.ledger.grant(&alice, 2, Identity([0x77; 20])).unwrap();
    d.set_grade(&d.alice, 1, 70).unwrap();
    d.set_grade(&d.alice, 1, 71).unwrap();

    assert!(d.ledger.is_granted(&alice, 1, &bob).unwrap());
    assert!(!d.ledger.is_granted(&alice, 2, &bob).unwrap());
    assert!(!d.ledger.is_granted(&bob, 1, &alice).unwrap());
}

#[tokio::test]
async fn decryption_requires_ownership_or_grant() {
    let d = Deployment::new();
    let handle = d.set_grade(&d.alice, 3, 64).unwrap();
    let flow = d.flow();

    assert!(matches!(
        flow.decrypt(handle, &d.bob).await,
        Err(DecryptError::NotAuthorized(_))
    ));
    assert!(matches!(
        flow.decrypt(handle, &d.writer).await,
        Err(DecryptError::NotAuthorized(_))
    ));
    assert_eq!(flow.decrypt(handle, &d.alice).await.unwrap(), 64);

    // A grant on another subject does not help
    d.ledger.grant(&d.alice.identity(), 4, d.bob.identity()).unwrap();
    assert!(flow.decrypt(handle, &d.bob).await.is_err());
}

#[tokio::test]
async fn authorization_expires() {
    let d = Deployment::new();
    let handle = d.set_grade(&d.alice, 0, 58).unwrap();
    let oracle = LocalOracle::new(d.service.clone());

    let grant = AuthorizationGrant::issue(&d.alice, d.service.domain(), [CONTRACT], CHAIN, NOW, 1)
        .unwrap();
    let request = grant.request(handle, CONTRACT);

    d.clock.advance(SECONDS_PER_DAY);
    assert!(oracle.user_decrypt(&request).await.is_ok());

    d.clock.advance(1);
    assert_eq!(
        oracle.user_decrypt(&request).await.unwrap_err(),
        OracleError::Expired {
            expired_at: NOW + SECONDS_PER_DAY
        }
    );
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn owner_reads_their_grade() {
    let d = Deployment::new();
    let handle = d
        .set_grade(&d.alice, Category::Mathematics.id(), 95)
        .unwrap();
    assert!(!handle.is_empty());

    let record = d
        .ledger
        .read(&d.alice.identity(), Category::Mathematics.id())
        .unwrap();
    assert_eq!(record.handle(), handle);
    assert_eq!(d.flow().decrypt(record.handle(), &d.alice).await.unwrap(), 95);
}

#[tokio::test]
async fn viewer_reads_after_grant() {
    let d = Deployment::new();
    let handle = d.set_grade(&d.alice, 1, 95).unwrap();
    let flow = d.flow();

    assert!(matches!(
        flow.decrypt(handle, &d.bob).await,
        Err(DecryptError::NotAuthorized(_))
    ));

    d.ledger.grant(&d.alice.identity(), 1, d.bob.identity()).unwrap();
    assert_eq!(flow.decrypt(handle, &d.bob).await.unwrap(), 95);

    // The grant carries over to later grades in the same subject
    let next = d.set_grade(&d.alice, 1, 97).unwrap();
    assert_eq!(flow.decrypt(next, &d.bob).await.unwrap(), 97);
    assert!(matches!(
        flow.decrypt(handle, &d.bob).await,
        Err(DecryptError::NoSuchRecord(h)) if h == handle
    ));
}

#[test]
fn unknown_category_changes_nothing() {
    let d = Deployment::new();
    let before = d.set_grade(&d.alice, 2, 50).unwrap();

    let err = d.set_grade(&d.alice, 7, 90).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidCategory(_)));
    assert!(matches!(
        d.ledger.grant(&d.alice.identity(), 7, d.bob.identity()),
        Err(LedgerError::InvalidCategory(_))
    ));
    assert!(d.ledger.read(&d.alice.identity(), 7).is_err());

    assert_eq!(d.ledger.read(&d.alice.identity(), 2).unwrap().handle(), before);
}

#[test]
fn non_writer_cannot_set() {
    let d = Deployment::new();
    let input = d.seal(99, &d.alice);
    let err = d
        .ledger
        .write(&d.alice.identity(), d.alice.identity(), 2, &input)
        .unwrap_err();

    assert!(matches!(err, LedgerError::NotAuthorizedWriter(_)));
    assert!(!d.ledger.read(&d.alice.identity(), 2).unwrap().exists());
}

#[tokio::test]
async fn empty_handle_never_reaches_the_oracle() {
    let d = Deployment::new();
    let record = d.ledger.read(&d.alice.identity(), 0).unwrap();
    assert!(matches!(
        d.flow().decrypt(record.handle(), &d.alice).await,
        Err(DecryptError::NoSuchRecord(_))
    ));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

const RACING_WRITERS: usize = 16;

/// Races many writes to one (owner, category) slot and checks that exactly
/// one of them is left live. Returns the surviving handle.
fn race_one_slot(store: Arc<dyn LedgerStore>) -> Handle {
    let writer = Keypair::new_random();
    let alice = Keypair::new_random();
    let ledger = AccessControlLedger::new(
        CONTRACT,
        WriterAuthority::new(writer.identity()).unwrap(),
        store,
    )
    .unwrap();

    let network = StaticSecret::random_from_rng(OsRng);
    let pipeline = EncryptionPipeline::new(PublicKey::from(&network).to_bytes());
    let inputs: Vec<SealedInput> = (0..RACING_WRITERS)
        .map(|i| {
            pipeline
                .encrypt_grade(i as i64, CONTRACT, writer.identity())
                .unwrap()
        })
        .collect();

    let handles: Vec<Handle> = thread::scope(|scope| {
        let workers: Vec<_> = inputs
            .iter()
            .map(|input| {
                let ledger = &ledger;
                let caller = writer.identity();
                let owner = alice.identity();
                scope.spawn(move || ledger.write(&caller, owner, 1, input).unwrap())
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let live = ledger.read(&alice.identity(), 1).unwrap();
    assert!(live.exists());
    let survivor = live.handle();
    assert!(handles.contains(&survivor));

    for handle in &handles {
        let is_live = *handle == survivor;
        assert_eq!(ledger.ciphertext(handle).unwrap().is_some(), is_live);
        assert_eq!(
            ledger.can_decrypt(handle, &alice.identity()).unwrap(),
            is_live
        );
    }
    survivor
}

#[test]
fn concurrent_writes_to_one_slot_in_memory() {
    let store = Arc::new(MemoryStore::new());
    race_one_slot(store.clone());
    assert_eq!(store.ciphertext_count(), 1);
}

#[test]
fn concurrent_writes_to_one_slot_in_rocksdb() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksDbStore::open(dir.path()).unwrap());
    let survivor = race_one_slot(store.clone());
    assert!(store.ciphertext(&survivor).unwrap().is_some());
}
