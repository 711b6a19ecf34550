//! Decryption oracle
//!
//! Holds the network secret. For each request it checks, in order:
//!
//! ```text
//!   verifying key ──derives──▶ requester          else NotAuthorized
//!   signature over the authorization               else NotAuthorized
//!   chain, duration and start time                 else NotAuthorized
//!   now ≤ start + days·86400                       else Expired
//!   contract is this ledger and is covered         else NotAuthorized
//!   handle is a live record                        else NoSuchRecord
//!   ledger.can_decrypt(handle, requester)          else NotAuthorized
//! ```
//!
//! and only then re-encrypts the value to the request's ephemeral key.

pub mod keys;
pub mod local;

use std::sync::Arc;
use tracing::{error, info, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use gradeseal_identity::Identity;
use gradeseal_privacy::open_value;
use gradeseal_reader::{
    Clock, OracleError, UserDecryptRequest, UserDecryptResponse, seal_response,
};
use gradeseal_typed_data::{Domain, verify_structured};

use crate::ledger::{AccessControlLedger, LedgerError};

pub use keys::load_or_create_network_key;
pub use local::LocalOracle;

#[derive(Debug, Clone)]
pub struct OraclePolicy {
    /// Longest validity window a requester may ask for
    pub max_duration_days: u32,
    /// How far in the future an authorization may start
    pub max_clock_skew_secs: u64,
}

impl Default for OraclePolicy {
    fn default() -> Self {
        Self {
            max_duration_days: 365,
            max_clock_skew_secs: 300,
        }
    }
}

pub struct DecryptionService {
    ledger: Arc<AccessControlLedger>,
    network_key: StaticSecret,
    domain: Domain,
    clock: Arc<dyn Clock>,
    policy: OraclePolicy,
}

impl DecryptionService {
    pub fn new(
        ledger: Arc<AccessControlLedger>,
        network_key: StaticSecret,
        domain: Domain,
        clock: Arc<dyn Clock>,
        policy: OraclePolicy,
    ) -> Self {
        Self {
            ledger,
            network_key,
            domain,
            clock,
            policy,
        }
    }

    /// Key clients encrypt inputs under.
    pub fn network_public_key(&self) -> [u8; 32] {
        PublicKey::from(&self.network_key).to_bytes()
    }

    /// Domain authorizations must be signed under.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn user_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<UserDecryptResponse, OracleError> {
        let outcome = self.authorize_and_decrypt(request);
        match &outcome {
            Ok(_) => info!(
                requester = %request.requester,
                handle = %request.handle,
                "released re-encrypted value"
            ),
            Err(OracleError::Protocol(reason)) => error!(
                handle = %request.handle,
                reason = %reason,
                "user decryption failed"
            ),
            Err(e) => warn!(
                requester = %request.requester,
                handle = %request.handle,
                error = %e,
                "user decryption refused"
            ),
        }
        outcome
    }

    fn authorize_and_decrypt(
        &self,
        request: &UserDecryptRequest,
    ) -> Result<UserDecryptResponse, OracleError> {
        let auth = &request.authorization;

        if Identity::from_verifying_key(&request.verifying_key) != request.requester {
            return Err(OracleError::NotAuthorized(
                "verifying key does not belong to the requester".into(),
            ));
        }
        verify_structured(&self.domain, auth, &request.signature, &request.verifying_key)
            .map_err(|e| OracleError::NotAuthorized(format!("authorization signature: {e}")))?;

        if auth.contracts_chain_id != self.domain.chain_id {
            return Err(OracleError::NotAuthorized(format!(
                "authorization is for chain {}, oracle serves {}",
                auth.contracts_chain_id, self.domain.chain_id
            )));
        }
        if auth.duration_days == 0 || auth.duration_days > self.policy.max_duration_days {
            return Err(OracleError::NotAuthorized(format!(
                "duration must be 1..={} days",
                self.policy.max_duration_days
            )));
        }

        let now = self.clock.now();
        if auth.start_timestamp > now.saturating_add(self.policy.max_clock_skew_secs) {
            return Err(OracleError::NotAuthorized(
                "authorization starts in the future".into(),
            ));
        }
        if auth.is_expired_at(now) {
            return Err(OracleError::Expired {
                expired_at: auth.expires_at(),
            });
        }

        let contract = self.ledger.contract();
        if request.contract != contract || !auth.covers(&contract) {
            return Err(OracleError::NotAuthorized(format!(
                "authorization does not cover contract {contract}"
            )));
        }

        if request.handle.is_empty() {
            return Err(OracleError::NoSuchRecord(request.handle));
        }
        let stored = self
            .ledger
            .ciphertext(&request.handle)
            .map_err(ledger_unavailable)?
            .ok_or(OracleError::NoSuchRecord(request.handle))?;

        if !self
            .ledger
            .can_decrypt(&request.handle, &request.requester)
            .map_err(ledger_unavailable)?
        {
            return Err(OracleError::NotAuthorized(format!(
                "{} may not decrypt {}",
                request.requester, request.handle
            )));
        }

        let value = open_value(
            &stored.sealed_box(),
            &self.network_key,
            &stored.contract(),
            &stored.submitter(),
        )
        .map_err(|e| OracleError::Protocol(format!("stored ciphertext did not open: {e}")))?;

        seal_response(request, value)
            .map_err(|e| OracleError::Protocol(format!("re-encryption failed: {e}")))
    }
}

fn ledger_unavailable(err: LedgerError) -> OracleError {
    OracleError::Unreachable(format!("ledger unavailable: {err}"))
}
