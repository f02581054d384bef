//! Arbitrage bot entry point
//!
//! 1. Loads `.env` and initializes logging
//! 2. Loads configuration (first argument, `CONFIG_PATH`, or `config.yaml`)
//! 3. Builds the Apex and Bybit REST clients and the engine
//! 4. Runs until Ctrl+C, SIGTERM, or the engine stops itself

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use arb_bot::adapters::{ApexClient, BybitClient};
use arb_bot::config;
use arb_bot::core::{init_logging, ArbitrageEngine};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn config_path() -> PathBuf {
    env::args()
        .nth(1)
        .or_else(|| env::var("CONFIG_PATH").ok().filter(|p| !p.is_empty()))
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    init_logging();

    let path = config_path();
    info!(path = %path.display(), "Loading configuration");
    let config = match config::load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "[CONFIG] Configuration failed");
            std::process::exit(1);
        }
    };

    let home = Arc::new(ApexClient::new(
        config.apex.base_url.clone(),
        config.apex.api_key.clone(),
        config.apex.api_secret.clone(),
        config.apex.passphrase.clone(),
    ));
    let hedge = Arc::new(BybitClient::new(
        config.bybit.base_url.clone(),
        config.bybit.api_key.clone(),
        config.bybit.api_secret.clone(),
    ));

    let engine = ArbitrageEngine::new(config, home, hedge);
    engine.start().await.context("engine failed to start")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
            }
            info!("[SHUTDOWN] Interrupt received");
        }
        _ = terminate_signal() => {
            info!("[SHUTDOWN] SIGTERM received");
        }
        _ = engine.stopped() => {
            info!("[SHUTDOWN] Engine stopped itself");
        }
    }

    engine.stop().await;
    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
