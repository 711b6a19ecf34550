use thiserror::Error;

use gradeseal_handle::Handle;
use gradeseal_typed_data::TypedDataError;

/// Failures reported by (or while reaching) the decryption oracle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("authorization expired at {expired_at}")]
    Expired { expired_at: u64 },
    #[error("no ciphertext for handle {0}")]
    NoSuchRecord(Handle),
    #[error("oracle unreachable: {0}")]
    Unreachable(String),
    #[error("oracle protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("no value stored for handle {0}")]
    NoSuchRecord(Handle),
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("authorization expired at {expired_at}")]
    Expired { expired_at: u64 },
    #[error("oracle unreachable after {attempts} attempts: {last_error}")]
    OracleUnreachable { attempts: u32, last_error: String },
    #[error("could not sign authorization: {0}")]
    Signing(#[from] TypedDataError),
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
}

impl From<OracleError> for DecryptError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::NotAuthorized(reason) => DecryptError::NotAuthorized(reason),
            OracleError::Expired { expired_at } => DecryptError::Expired { expired_at },
            OracleError::NoSuchRecord(handle) => DecryptError::NoSuchRecord(handle),
            OracleError::Unreachable(last_error) => DecryptError::OracleUnreachable {
                attempts: 1,
                last_error,
            },
            OracleError::Protocol(reason) => DecryptError::MalformedResponse(reason),
        }
    }
}
