//! API Routes
//!
//! Router configuration for the HTTP API.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, ApiState};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Health & Info
        .route("/health", get(handlers::health))
        .route("/info", get(handlers::info))
        // Ledger
        .route("/ledger/record", post(handlers::get_record))
        .route("/ledger/grant", post(handlers::get_grant_status))
        .route("/ledger/call", post(handlers::submit_call))
        // Oracle
        .route("/oracle/user-decrypt", post(handlers::user_decrypt))
        .layer(TraceLayer::new_for_http())
        // CORS
        .layer(CorsLayer::permissive())
        .with_state(state)
}
