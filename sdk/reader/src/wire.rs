//! Oracle wire format (JSON over HTTP, or direct calls in-process).

use serde::{Deserialize, Serialize};
use x25519_dalek::PublicKey;

use gradeseal_handle::Handle;
use gradeseal_identity::{Identity, Signature};
use gradeseal_privacy::{SealError, SealedBox};
use gradeseal_typed_data::UserDecryptAuthorization;

use crate::error::OracleError;

pub(crate) const RESPONSE_LABEL: &[u8] = b"gradeseal-reencrypt-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptRequest {
    pub handle: Handle,
    /// Contract that holds the handle.
    pub contract: Identity,
    pub authorization: UserDecryptAuthorization,
    /// Signature over `authorization` under the decryption domain.
    pub signature: Signature,
    pub requester: Identity,
    #[serde(with = "hex::serde")]
    pub verifying_key: [u8; 32],
}

/// The plaintext re-encrypted to the requester's ephemeral key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptResponse {
    pub handle: Handle,
    pub sealed: SealedBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
    NotAuthorized,
    Expired,
    NoSuchRecord,
    Unavailable,
    BadRequest,
}

/// Error body returned by the oracle endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRejection {
    pub code: RejectionCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<Handle>,
}

impl From<&OracleError> for OracleRejection {
    fn from(err: &OracleError) -> Self {
        let (code, expired_at, handle) = match err {
            OracleError::NotAuthorized(_) => (RejectionCode::NotAuthorized, None, None),
            OracleError::Expired { expired_at } => (RejectionCode::Expired, Some(*expired_at), None),
            OracleError::NoSuchRecord(h) => (RejectionCode::NoSuchRecord, None, Some(*h)),
            OracleError::Unreachable(_) => (RejectionCode::Unavailable, None, None),
            OracleError::Protocol(_) => (RejectionCode::BadRequest, None, None),
        };
        Self {
            code,
            message: err.to_string(),
            expired_at,
            handle,
        }
    }
}

impl OracleRejection {
    pub fn into_error(self) -> OracleError {
        match self.code {
            RejectionCode::NotAuthorized => OracleError::NotAuthorized(self.message),
            RejectionCode::Expired => OracleError::Expired {
                expired_at: self.expired_at.unwrap_or_default(),
            },
            RejectionCode::NoSuchRecord => {
                OracleError::NoSuchRecord(self.handle.unwrap_or(Handle::EMPTY))
            }
            RejectionCode::Unavailable => OracleError::Unreachable(self.message),
            RejectionCode::BadRequest => OracleError::Protocol(self.message),
        }
    }
}

/// Associated data for a re-encrypted value: it names the handle and the
/// identity it was released to.
pub(crate) fn response_aad(handle: &Handle, requester: &Identity) -> [u8; 52] {
    let mut aad = [0u8; 52];
    aad[..32].copy_from_slice(handle.as_bytes());
    aad[32..].copy_from_slice(requester.as_bytes());
    aad
}

/// Re-encrypts `value` for the ephemeral key named in `request`.
pub fn seal_response(
    request: &UserDecryptRequest,
    value: u32,
) -> Result<UserDecryptResponse, SealError> {
    let recipient = PublicKey::from(request.authorization.public_key);
    let sealed = SealedBox::seal(
        &value.to_le_bytes(),
        &recipient,
        RESPONSE_LABEL,
        &response_aad(&request.handle, &request.requester),
    )?;
    Ok(UserDecryptResponse {
        handle: request.handle,
        sealed,
    })
}
