use chacha20poly1305::aead::OsRng;
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey};

use gradeseal_handle::Handle;
use gradeseal_identity::{Identity, Signature};
use gradeseal_typed_data::{Domain, StructuredSigner, TypedDataError, UserDecryptAuthorization};

use crate::error::DecryptError;
use crate::wire::{RESPONSE_LABEL, UserDecryptRequest, UserDecryptResponse, response_aad};

/// A signed, time-boxed authorization together with the single-use
/// ephemeral key it names. Opening a response consumes the grant.
pub struct AuthorizationGrant {
    secret: EphemeralSecret,
    public_key: PublicKey,
    authorization: UserDecryptAuthorization,
    signature: Signature,
    requester: Identity,
    verifying_key: [u8; 32],
}

impl AuthorizationGrant {
    pub fn issue<S: StructuredSigner>(
        signer: &S,
        domain: &Domain,
        contracts: impl IntoIterator<Item = Identity>,
        chain_id: u64,
        start_timestamp: u64,
        duration_days: u32,
    ) -> Result<Self, TypedDataError> {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret);

        let authorization = UserDecryptAuthorization::new(
            public_key.to_bytes(),
            contracts,
            chain_id,
            start_timestamp,
            duration_days,
        );
        let signature = signer.sign_structured(domain, &authorization)?;

        Ok(Self {
            secret,
            public_key,
            authorization,
            signature,
            requester: signer.identity(),
            verifying_key: signer.verifying_key(),
        })
    }

    pub fn authorization(&self) -> &UserDecryptAuthorization {
        &self.authorization
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.public_key.to_bytes()
    }

    pub fn requester(&self) -> Identity {
        self.requester
    }

    pub fn expires_at(&self) -> u64 {
        self.authorization.expires_at()
    }

    pub fn request(&self, handle: Handle, contract: Identity) -> UserDecryptRequest {
        UserDecryptRequest {
            handle,
            contract,
            authorization: self.authorization.clone(),
            signature: self.signature,
            requester: self.requester,
            verifying_key: self.verifying_key,
        }
    }

    /// Decrypts the oracle's answer for `handle`.
    pub fn open(self, response: &UserDecryptResponse, handle: Handle) -> Result<u32, DecryptError> {
        if response.handle != handle {
            return Err(DecryptError::MalformedResponse(format!(
                "response is for {} instead of {}",
                response.handle, handle
            )));
        }

        let shared = self
            .secret
            .diffie_hellman(&response.sealed.sender_public_key());
        let plaintext = response
            .sealed
            .open_with_shared(
                &shared,
                &self.public_key,
                RESPONSE_LABEL,
                &response_aad(&handle, &self.requester),
            )
            .map_err(|e| DecryptError::MalformedResponse(e.to_string()))?;

        let bytes: [u8; 4] = plaintext.as_slice().try_into().map_err(|_| {
            DecryptError::MalformedResponse(format!(
                "expected a 4-byte value, got {} bytes",
                plaintext.len()
            ))
        })?;
        Ok(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("public_key", &hex::encode(self.public_key.as_bytes()))
            .field("requester", &self.requester)
            .field("expires_at", &self.expires_at())
            .finish_non_exhaustive()
    }
}
