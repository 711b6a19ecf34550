//! Decryption flow
//!
//! Drives one decryption end to end. Transient oracle failures are retried
//! with exponential backoff; every other failure is returned as is. Before
//! each attempt the flow checks that the current authorization will still
//! be valid when the oracle sees it, and signs a new one if not.

use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use gradeseal_handle::Handle;
use gradeseal_identity::Identity;
use gradeseal_typed_data::{Domain, StructuredSigner};

use crate::clock::Clock;
use crate::error::{DecryptError, OracleError};
use crate::grant::AuthorizationGrant;
use crate::oracle::DecryptionOracle;

#[derive(Debug, Clone)]
pub struct DecryptPolicy {
    /// Validity window of each signed authorization
    pub duration_days: u32,
    /// Upper bound on a single oracle round trip
    pub request_timeout: Duration,
    /// Retries after the first attempt, for transient failures only
    pub max_retries: u32,
    /// Backoff before retry n is `retry_base * 2^(n-1)`
    pub retry_base: Duration,
}

impl Default for DecryptPolicy {
    fn default() -> Self {
        Self {
            duration_days: 10,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base: Duration::from_millis(500),
        }
    }
}

impl DecryptPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.retry_base.saturating_mul(1 << shift)
    }

    /// Whole seconds a grant must still be valid for when a request is sent.
    fn request_margin_secs(&self) -> u64 {
        let secs = self.request_timeout.as_millis().div_ceil(1000);
        u64::try_from(secs).unwrap_or(u64::MAX)
    }
}

pub struct DecryptionFlow<O, C> {
    oracle: O,
    clock: C,
    domain: Domain,
    contract: Identity,
    policy: DecryptPolicy,
}

impl<O: DecryptionOracle, C: Clock> DecryptionFlow<O, C> {
    /// `domain` must be the oracle's decryption domain; its chain id is also
    /// the chain the authorization names.
    pub fn new(oracle: O, clock: C, domain: Domain, contract: Identity, policy: DecryptPolicy) -> Self {
        Self {
            oracle,
            clock,
            domain,
            contract,
            policy,
        }
    }

    /// Signs a fresh authorization for this flow's contract, starting now.
    pub fn issue_grant<S: StructuredSigner>(
        &self,
        signer: &S,
    ) -> Result<AuthorizationGrant, DecryptError> {
        let grant = AuthorizationGrant::issue(
            signer,
            &self.domain,
            [self.contract],
            self.domain.chain_id,
            self.clock.now(),
            self.policy.duration_days,
        )?;
        debug!(
            requester = %grant.requester(),
            expires_at = grant.expires_at(),
            "issued decryption authorization"
        );
        Ok(grant)
    }

    /// Resolves `handle` to its plaintext on behalf of `signer`.
    pub async fn decrypt<S: StructuredSigner>(
        &self,
        handle: Handle,
        signer: &S,
    ) -> Result<u32, DecryptError> {
        if handle.is_empty() {
            return Err(DecryptError::NoSuchRecord(handle));
        }

        let mut grant = self.issue_grant(signer)?;
        let mut attempts: u32 = 0;

        loop {
            if !self.outlives_next_request(&grant) {
                info!("decryption authorization about to lapse, signing a new one");
                grant = self.issue_grant(signer)?;
            }

            attempts += 1;
            let request = grant.request(handle, self.contract);
            let outcome = match timeout(self.policy.request_timeout, self.oracle.user_decrypt(&request)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Unreachable(format!(
                    "no answer within {:?}",
                    self.policy.request_timeout
                ))),
            };

            match outcome {
                Ok(response) => return grant.open(&response, handle),
                Err(OracleError::Unreachable(reason)) => {
                    if attempts > self.policy.max_retries {
                        return Err(DecryptError::OracleUnreachable {
                            attempts,
                            last_error: reason,
                        });
                    }
                    let delay = self.policy.backoff(attempts);
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "decryption oracle unreachable, retrying"
                    );
                    sleep(delay).await;
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    fn outlives_next_request(&self, grant: &AuthorizationGrant) -> bool {
        let deadline = self
            .clock
            .now()
            .saturating_add(self.policy.request_margin_secs());
        deadline <= grant.expires_at()
    }
}
