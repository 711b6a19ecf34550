//! API Types
//!
//! Request and response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

use gradeseal_handle::Handle;
use gradeseal_identity::Identity;
use gradeseal_typed_data::Domain;

// ============================================================================
// Health & Info
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
    pub uptime_secs: u64,
}

/// Everything a client needs to encrypt, sign and authorize against this node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub contract: Identity,
    pub writer: Identity,
    pub chain_id: u64,
    /// Hex-encoded x25519 key that inputs are encrypted under
    pub network_public_key: String,
    pub decryption_domain: Domain,
}

impl InfoResponse {
    pub fn network_key_bytes(&self) -> Option<[u8; 32]> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(&self.network_public_key, &mut out).ok()?;
        Some(out)
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Addresses arrive as text so malformed ones get a proper error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    pub owner: String,
    pub category: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub owner: Identity,
    pub category: u8,
    pub category_name: String,
    pub handle: Handle,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantStatusRequest {
    pub owner: String,
    pub category: u8,
    pub viewer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantStatusResponse {
    pub granted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCallResponse {
    pub accepted: bool,
    pub caller: Identity,
    /// Handle now stored, for record writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<Handle>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(msg, "BAD_REQUEST")
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(msg, "UNAUTHORIZED")
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(msg, "FORBIDDEN")
    }

    pub fn invalid_proof(msg: impl Into<String>) -> Self {
        Self::new(msg, "INVALID_PROOF")
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(msg, "INTERNAL_ERROR")
    }
}
