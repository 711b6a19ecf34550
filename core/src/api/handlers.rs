//! API Handlers
//!
//! Request handlers for the HTTP API.

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use log::{error, warn};

use super::types::*;
use crate::ledger::{AccessControlLedger, LedgerError};
use crate::oracle::DecryptionService;
use gradeseal_handle::Category;
use gradeseal_identity::Identity;
use gradeseal_reader::{OracleError, OracleRejection, UserDecryptRequest};
use gradeseal_transaction::{LedgerCall, SignedCall};

// ============================================================================
// Shared State
// ============================================================================

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<AccessControlLedger>,
    pub oracle: Arc<DecryptionService>,
    pub chain_id: u64,
    pub start_time: std::time::Instant,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn parse_identity(field: &str, text: &str) -> Result<Identity, ApiError> {
    text.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(format!(
                "{field}: invalid address {text:?}"
            ))),
        )
    })
}

fn ledger_error(err: LedgerError) -> ApiError {
    match err {
        LedgerError::InvalidCategory(_) | LedgerError::MalformedIdentity(_) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(err.to_string())),
        ),
        LedgerError::NotAuthorizedWriter(_) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::forbidden(err.to_string())),
        ),
        LedgerError::InvalidProof(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::invalid_proof(err.to_string())),
        ),
        LedgerError::Storage(e) => {
            error!("Ledger storage failure: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal("Ledger storage failure")),
            )
        }
    }
}

// ============================================================================
// Health & Info
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Deployment parameters
pub async fn info(State(state): State<ApiState>) -> impl IntoResponse {
    Json(InfoResponse {
        contract: state.ledger.contract(),
        writer: state.ledger.writer(),
        chain_id: state.chain_id,
        network_public_key: hex::encode(state.oracle.network_public_key()),
        decryption_domain: state.oracle.domain().clone(),
    })
}

// ============================================================================
// Ledger
// ============================================================================

/// Read the record for an (owner, category) slot
pub async fn get_record(
    State(state): State<ApiState>,
    Json(req): Json<RecordRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    let owner = parse_identity("owner", &req.owner)?;
    let record = state.ledger.read(&owner, req.category).map_err(ledger_error)?;
    let category_name = Category::try_from(req.category)
        .map(|c| c.name().to_string())
        .unwrap_or_default();

    Ok(Json(RecordResponse {
        owner,
        category: req.category,
        category_name,
        handle: record.handle(),
        exists: record.exists(),
    }))
}

/// Whether a viewer was admitted to an owner's slot
pub async fn get_grant_status(
    State(state): State<ApiState>,
    Json(req): Json<GrantStatusRequest>,
) -> Result<Json<GrantStatusResponse>, ApiError> {
    let owner = parse_identity("owner", &req.owner)?;
    let viewer = parse_identity("viewer", &req.viewer)?;
    let granted = state
        .ledger
        .is_granted(&owner, req.category, &viewer)
        .map_err(ledger_error)?;
    Ok(Json(GrantStatusResponse { granted }))
}

/// Apply a signed ledger call
pub async fn submit_call(
    State(state): State<ApiState>,
    Json(signed): Json<SignedCall>,
) -> Result<Json<SubmitCallResponse>, ApiError> {
    let caller = signed
        .verify(&state.ledger.contract(), state.chain_id)
        .map_err(|e| {
            warn!("Rejected call with bad signature: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::unauthorized(e.to_string())),
            )
        })?;

    let handle = match &signed.call {
        LedgerCall::SetGrade {
            owner,
            category,
            input,
        } => Some(
            state
                .ledger
                .write(&caller, *owner, *category, input)
                .map_err(ledger_error)?,
        ),
        LedgerCall::AllowViewer { category, viewer } => {
            state
                .ledger
                .grant(&caller, *category, *viewer)
                .map_err(ledger_error)?;
            None
        }
    };

    Ok(Json(SubmitCallResponse {
        accepted: true,
        caller,
        handle,
    }))
}

// ============================================================================
// Oracle
// ============================================================================

/// Re-encrypt a value for an authorized requester
pub async fn user_decrypt(
    State(state): State<ApiState>,
    Json(req): Json<UserDecryptRequest>,
) -> impl IntoResponse {
    match state.oracle.user_decrypt(&req) {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            let status = match &e {
                OracleError::NotAuthorized(_) | OracleError::Expired { .. } => StatusCode::FORBIDDEN,
                OracleError::NoSuchRecord(_) => StatusCode::NOT_FOUND,
                OracleError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
                OracleError::Protocol(_) => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, Json(OracleRejection::from(&e))).into_response()
        }
    }
}
