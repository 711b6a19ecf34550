//! Node assembly
//!
//! Turns a [`GradesealConfig`] into a running ledger, oracle and API state.

use anyhow::{Context, Result, anyhow};
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use gradeseal_config::{GradesealConfig, StorageBackend};
use gradeseal_identity::Identity;
use gradeseal_reader::SystemClock;
use gradeseal_typed_data::Domain;

use crate::api::ApiState;
use crate::ledger::{AccessControlLedger, LedgerStore, MemoryStore, RocksDbStore, WriterAuthority};
use crate::oracle::{DecryptionService, OraclePolicy, load_or_create_network_key};

const CONTRACT_CONTEXT: &str = "gradeseal 2025-01 contract address v1";

/// Contract identity used when none is configured: stable for a given writer
/// and chain.
pub fn derive_contract_address(writer: &Identity, chain_id: u64) -> Identity {
    let mut hasher = blake3::Hasher::new_derive_key(CONTRACT_CONTEXT);
    hasher.update(writer.as_bytes());
    hasher.update(&chain_id.to_le_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; Identity::LEN];
    out.copy_from_slice(&digest.as_bytes()[..Identity::LEN]);
    Identity(out)
}

pub fn open_store(config: &GradesealConfig) -> Result<Arc<dyn LedgerStore>> {
    match config.database.backend {
        StorageBackend::Rocksdb => {
            let store = RocksDbStore::open(&config.database.path)
                .with_context(|| format!("Failed to open database at {}", config.database.path))?;
            info!("Opened RocksDB ledger at {}", config.database.path);
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            info!("Using in-memory ledger (state is lost on exit)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn parse_address(field: &str, text: &str) -> Result<Identity> {
    text.parse()
        .map_err(|e| anyhow!("{field}: {e}"))
}

/// The ledger contract identity for this deployment.
pub fn resolve_contract(config: &GradesealConfig, writer: &Identity) -> Result<Identity> {
    match &config.ledger.contract_address {
        Some(text) => parse_address("ledger.contract_address", text),
        None => Ok(derive_contract_address(writer, config.ledger.chain_id)),
    }
}

pub fn build_ledger(
    config: &GradesealConfig,
    store: Arc<dyn LedgerStore>,
) -> Result<AccessControlLedger> {
    let writer_text = config
        .ledger
        .writer_address
        .as_deref()
        .context("ledger.writer_address must be set (or GS_WRITER)")?;
    let writer = parse_address("ledger.writer_address", writer_text)?;
    let contract = resolve_contract(config, &writer)?;

    let authority = WriterAuthority::new(writer)?;
    let ledger = AccessControlLedger::new(contract, authority, store)?;
    info!("Ledger contract {} (writer {})", contract, writer);
    Ok(ledger)
}

pub fn build_oracle(
    config: &GradesealConfig,
    ledger: Arc<AccessControlLedger>,
) -> Result<DecryptionService> {
    let network_key = load_or_create_network_key(Path::new(&config.oracle.network_key_path))?;
    let verifying_contract = match &config.oracle.verifying_contract {
        Some(text) => parse_address("oracle.verifying_contract", text)?,
        None => ledger.contract(),
    };
    let domain = Domain::decryption(config.ledger.chain_id, verifying_contract);
    let policy = OraclePolicy {
        max_duration_days: config.oracle.max_duration_days,
        max_clock_skew_secs: config.oracle.max_clock_skew_secs,
    };

    Ok(DecryptionService::new(
        ledger,
        network_key,
        domain,
        Arc::new(SystemClock),
        policy,
    ))
}

/// Everything the HTTP API needs.
pub fn build_state(config: &GradesealConfig) -> Result<ApiState> {
    let store = open_store(config)?;
    let ledger = Arc::new(build_ledger(config, store)?);
    let oracle = Arc::new(build_oracle(config, ledger.clone())?);

    Ok(ApiState {
        ledger,
        oracle,
        chain_id: config.ledger.chain_id,
        start_time: Instant::now(),
    })
}
