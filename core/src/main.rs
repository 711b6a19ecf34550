// Copyright 2025 Gradeseal Contributors
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

use gradeseal_config::GradesealConfig;
use gradeseal_core::api::create_router;
use gradeseal_core::node::build_state;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = GradesealConfig::load()?;

    info!("============================================");
    info!("          GRADESEAL NODE v{}", env!("CARGO_PKG_VERSION"));
    info!("============================================");
    info!("API          : {}", config.api.bind_addr());
    info!("DB path      : {}", config.database.path);
    info!("DB backend   : {:?}", config.database.backend);
    info!("Chain id     : {}", config.ledger.chain_id);
    info!("Network key  : {}", config.oracle.network_key_path);
    info!("============================================");

    let state = build_state(&config)?;
    info!(
        "Network public key: {}",
        hex::encode(state.oracle.network_public_key())
    );

    // Ledger event log
    let mut events = state.ledger.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => info!("event {}", line),
                    Err(e) => warn!("Failed to encode ledger event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event log fell behind, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let router = create_router(state);
    let listener = TcpListener::bind(config.api.bind_addr()).await?;
    info!("HTTP API listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    info!("Gradeseal node stopped");
    Ok(())
}
