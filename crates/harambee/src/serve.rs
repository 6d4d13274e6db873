// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `harambee serve` command implementation.
//!
//! Opens the store, builds the gateway, Telegram sink and verification
//! engine, recovers payments left pending by a previous run, then waits
//! for a shutdown signal. On shutdown every running verification is
//! stopped and the pool is closed.

use std::sync::Arc;
use std::time::Duration;

use harambee_config::model::HarambeeConfig;
use harambee_core::types::now_timestamp;
use harambee_core::{HarambeeError, HealthStatus, PluginAdapter, StorageAdapter};
use harambee_gateway::HttpGateway;
use harambee_storage::SqliteStorage;
use harambee_telegram::TelegramNotifier;
use harambee_verify::{EngineSettings, TierTable, VerificationEngine};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// Opens the SQLite store and bootstraps the schema.
pub async fn open_storage(config: &HarambeeConfig) -> Result<Arc<SqliteStorage>, HarambeeError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

/// Builds the engine over the live gateway and Telegram sink.
pub fn build_engine(
    config: &HarambeeConfig,
    storage: Arc<SqliteStorage>,
) -> Result<(VerificationEngine, Arc<HttpGateway>, Arc<TelegramNotifier>), HarambeeError> {
    let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
    let notifier = Arc::new(TelegramNotifier::new(&config.telegram)?);
    let engine = VerificationEngine::new(
        storage,
        gateway.clone(),
        notifier.clone(),
        TierTable::new(config.tiers.clone()),
        EngineSettings::from_config(config),
    );
    Ok((engine, gateway, notifier))
}

/// Run the `harambee serve` command.
pub async fn run_serve(config: HarambeeConfig) -> Result<(), HarambeeError> {
    info!(name = %config.bot.name, "starting harambee");
    let storage = open_storage(&config).await?;
    let (engine, _gateway, notifier) = build_engine(&config, storage.clone())?;

    match notifier.health_check().await? {
        HealthStatus::Healthy => debug!("telegram reachable"),
        other => warn!(status = ?other, "telegram health check did not pass"),
    }

    engine.resume_pending().await?;

    let cancel = shutdown::install_signal_handler();
    let purge = spawn_mapping_purge(
        storage.clone(),
        config.storage.health_check_interval_secs,
        cancel.clone(),
    );

    info!(
        interval_secs = config.verification.interval_secs,
        max_attempts = config.verification.max_attempts,
        "harambee ready"
    );
    cancel.cancelled().await;

    for active in engine.active_verifications() {
        info!(
            reference = %active.reference,
            running_secs = active.running_for.as_secs(),
            "verification will resume on next start"
        );
    }
    engine.shutdown_all().await;
    if let Some(purge) = purge
        && let Err(e) = purge.await
    {
        warn!(error = %e, "phone mapping purge task ended abnormally");
    }
    if let Err(e) = notifier.shutdown().await {
        warn!(error = %e, "notifier shutdown failed");
    }
    storage.close().await?;
    info!("harambee stopped");
    Ok(())
}

/// Purges expired phone mappings every `interval_secs` until `cancel` fires.
///
/// Shares the pool health-check cadence; `0` disables it.
fn spawn_mapping_purge(
    storage: Arc<SqliteStorage>,
    interval_secs: u64,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match storage.purge_expired_phone_mappings(&now_timestamp()).await {
                        Ok(0) => {}
                        Ok(purged) => info!(purged, "expired phone mappings removed"),
                        Err(e) => error!(error = %e, "phone mapping purge failed"),
                    }
                }
            }
        }
    }))
}

/// Initialise the tracing subscriber with an `EnvFilter`.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("harambee={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
