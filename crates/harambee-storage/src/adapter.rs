// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use harambee_config::model::StorageConfig;
use harambee_core::types::{
    ChannelAccess, NewPayment, NotificationKind, NotificationRecord, Payment, PaymentCompletion,
    PaymentStatus, PaymentUpdate, PhoneMapping, User, UserUpsert, VerificationAttempt,
};
use harambee_core::{AdapterType, HarambeeError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::pool::ConnectionPool;
use crate::{queries, schema};

/// SQLite-backed storage adapter.
///
/// The pool is opened and the schema bootstrapped on the first call to
/// [`StorageAdapter::initialize`]; every other method fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, HarambeeError> {
        self.db.get().ok_or_else(|| HarambeeError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Number of notifications of `kind` recorded against a payment.
    pub async fn notification_count(
        &self,
        reference: &str,
        kind: NotificationKind,
    ) -> Result<i64, HarambeeError> {
        queries::notifications::count_for_payment(self.database()?, reference, &kind.to_string())
            .await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, HarambeeError> {
        let db = self.database()?;
        let stats = db.pool().stats();
        if stats.size == 0 {
            return Ok(HealthStatus::Unhealthy("connection pool is closed".into()));
        }
        if stats.in_use == stats.size {
            return Ok(HealthStatus::Degraded(format!(
                "all {} connections checked out",
                stats.size
            )));
        }
        db.transaction("health_check", |tx| {
            tx.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        })
        .await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HarambeeError> {
        if let Some(db) = self.db.get() {
            db.pool().close_all().await;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), HarambeeError> {
        let config = &self.config;
        if let Some(parent) = std::path::Path::new(&config.database_path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(HarambeeError::storage)?;
        }
        let db = self
            .db
            .get_or_try_init(|| async {
                let pool = ConnectionPool::open(
                    &config.database_path,
                    config.pool_size,
                    Duration::from_secs(config.busy_timeout_secs),
                )
                .await?;
                Ok::<_, HarambeeError>(Database::new(pool))
            })
            .await?;
        schema::initialize_with_retry(
            db,
            config.schema_init_attempts,
            Duration::from_millis(config.schema_init_backoff_ms),
        )
        .await?;
        if config.health_check_interval_secs > 0 {
            db.pool()
                .start_health_monitor(Duration::from_secs(config.health_check_interval_secs));
        }
        info!(path = %config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), HarambeeError> {
        let db = self.database()?;
        {
            let conn = db.pool().acquire()?;
            conn.call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)?;
        }
        debug!("WAL checkpoint complete");
        db.pool().close_all().await;
        Ok(())
    }

    // --- Users ---

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, HarambeeError> {
        queries::users::get_user(self.database()?, user_id).await
    }

    async fn upsert_user(&self, user: &UserUpsert) -> Result<(), HarambeeError> {
        queries::users::upsert_user(self.database()?, user).await
    }

    // --- Payments ---

    async fn create_payment(&self, payment: &NewPayment) -> Result<i64, HarambeeError> {
        queries::payments::create_payment(self.database()?, payment).await
    }

    async fn get_payment(&self, reference: &str) -> Result<Option<Payment>, HarambeeError> {
        queries::payments::get_payment(self.database()?, reference).await
    }

    async fn update_payment(
        &self,
        reference: &str,
        update: &PaymentUpdate,
    ) -> Result<bool, HarambeeError> {
        queries::payments::update_payment(self.database()?, reference, update).await
    }

    async fn list_payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>, HarambeeError> {
        queries::payments::list_payments_by_status(self.database()?, status).await
    }

    async fn complete_payment(
        &self,
        completion: &PaymentCompletion,
    ) -> Result<bool, HarambeeError> {
        queries::payments::complete_payment(self.database()?, completion).await
    }

    // --- Verification audit ---

    async fn record_verification_attempt(
        &self,
        attempt: &VerificationAttempt,
    ) -> Result<(), HarambeeError> {
        queries::verification_attempts::record_attempt(self.database()?, attempt).await
    }

    async fn list_verification_attempts(
        &self,
        reference: &str,
    ) -> Result<Vec<VerificationAttempt>, HarambeeError> {
        queries::verification_attempts::list_attempts(self.database()?, reference).await
    }

    // --- Phone mappings ---

    async fn store_phone_mapping(&self, mapping: &PhoneMapping) -> Result<(), HarambeeError> {
        queries::phone_mappings::store_mapping(self.database()?, mapping).await
    }

    async fn get_phone_mapping(
        &self,
        phone: &str,
    ) -> Result<Option<PhoneMapping>, HarambeeError> {
        queries::phone_mappings::get_mapping(self.database()?, phone).await
    }

    async fn purge_expired_phone_mappings(&self, now: &str) -> Result<usize, HarambeeError> {
        queries::phone_mappings::purge_expired(self.database()?, now).await
    }

    // --- Access and notifications ---

    async fn list_channel_access(
        &self,
        user_id: i64,
    ) -> Result<Vec<ChannelAccess>, HarambeeError> {
        queries::channel_access::list_channel_access(self.database()?, user_id).await
    }

    async fn record_notification(
        &self,
        notification: &NotificationRecord,
    ) -> Result<(), HarambeeError> {
        queries::notifications::record_notification(self.database()?, notification).await
    }
}
