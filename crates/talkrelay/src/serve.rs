// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `talkrelay serve` command implementation.
//!
//! Connects the Matrix transport, builds the remote backend client, and runs
//! the relay engine until SIGINT or SIGTERM. Shutdown drains the queue
//! workers and the poller before the adapters are released.

use std::sync::Arc;

use talkrelay_config::TalkrelayConfig;
use talkrelay_core::{HealthStatus, PluginAdapter, RelayError, RemoteBackend, RoomTransport};
use talkrelay_matrix::MatrixTransport;
use talkrelay_relay::{RelayEngine, install_signal_handler};
use talkrelay_remote::RemoteAdapter;
use tracing::{info, warn};

pub async fn run_serve(config: TalkrelayConfig) -> Result<(), RelayError> {
    init_tracing(&config.relay.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting talkrelay serve");

    let mut matrix = MatrixTransport::new(&config.matrix)?;
    matrix.connect().await?;
    let room: Arc<dyn RoomTransport> = Arc::new(matrix);
    let remote: Arc<dyn RemoteBackend> = Arc::new(RemoteAdapter::new(&config.remote)?);

    log_health(room.as_ref()).await;
    log_health(remote.as_ref()).await;

    let cancel = install_signal_handler();
    let engine = RelayEngine::new(&config, room, remote, cancel)?;

    engine.run().await;
    engine.shutdown().await;

    info!("talkrelay serve shutdown complete");
    Ok(())
}

async fn log_health<A: PluginAdapter + ?Sized>(adapter: &A) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => info!(adapter = adapter.name(), "adapter healthy"),
        Ok(HealthStatus::Degraded(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter degraded")
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter unhealthy")
        }
        Err(e) => warn!(adapter = adapter.name(), error = %e, "adapter health check failed"),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("talkrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
