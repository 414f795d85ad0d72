//! Startup helpers for the relay server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::server::{self, AppState};

/// Install the global `tracing` subscriber (INFO unless `RUST_LOG` says otherwise).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

/// Run the relay server until ctrl-c (used by the `sark-relay` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();

    tracing::info!("Starting Sark relay v{}", env!("CARGO_PKG_VERSION"));

    let (config, state) = match initialize() {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server_with_shutdown(state, config.port, shutdown_signal())) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Relay stopped");
    ExitCode::SUCCESS
}

/// Load configuration and build application state without starting the server.
///
/// # Errors
/// Returns an error if configuration is invalid or state creation fails.
pub fn initialize() -> Result<(RelayConfig, Arc<AppState>), Box<dyn std::error::Error + Send + Sync>> {
    let config = RelayConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    Ok((config, state))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
