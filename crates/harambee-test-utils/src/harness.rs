// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end verification scenarios.
//!
//! `TestHarness` assembles a real SQLite store in a temp directory, the
//! mock gateway and notifier, a [`VerificationEngine`] and a
//! [`DonationService`] over them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use harambee_config::model::{HarambeeConfig, StorageConfig};
use harambee_core::types::{
    NewPayment, Payment, Tier, UserUpsert, format_timestamp,
};
use harambee_core::{HarambeeError, StorageAdapter};
use harambee_storage::SqliteStorage;
use harambee_verify::{
    DonationService, DonationSettings, EngineSettings, TierTable, VerificationContext,
    VerificationEngine,
};

use crate::mock_gateway::MockGateway;
use crate::mock_notifier::MockNotifier;

/// Builder for test environments.
pub struct TestHarnessBuilder {
    settings: EngineSettings,
    tiers: Vec<Tier>,
    pool_size: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let config = HarambeeConfig::default();
        let tiers = config
            .tiers
            .iter()
            .map(|tier| Tier {
                invite_link: Some(format!("https://t.me/+{}", tier.name.to_lowercase())),
                channel_id: Some(format!("channel-{}", tier.name.to_lowercase())),
                ..tier.clone()
            })
            .collect();
        Self {
            settings: EngineSettings::from_config(&config),
            tiers,
            pool_size: 4,
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.settings.max_attempts = max_attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.settings.interval = interval;
        self
    }

    pub fn with_tiers(mut self, tiers: Vec<Tier>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Build the harness, creating and initializing the temp database.
    pub async fn build(self) -> Result<TestHarness, HarambeeError> {
        let temp_dir = tempfile::TempDir::new().map_err(HarambeeError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        // No health monitor: paused-clock tests would fire it while idle.
        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            pool_size: self.pool_size,
            busy_timeout_secs: 5,
            health_check_interval_secs: 0,
            schema_init_attempts: 3,
            schema_init_backoff_ms: 10,
        });
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(MockNotifier::new());
        let engine = VerificationEngine::new(
            storage.clone(),
            gateway.clone(),
            notifier.clone(),
            TierTable::new(self.tiers),
            self.settings.clone(),
        );

        let mut donation_settings = DonationSettings::from_config(&HarambeeConfig::default());
        donation_settings.payment_expiry = self.settings.payment_expiry;
        let donations = DonationService::new(
            storage.clone(),
            gateway.clone(),
            engine.clone(),
            donation_settings,
        );

        Ok(TestHarness {
            storage,
            gateway,
            notifier,
            engine,
            donations,
            settings: self.settings,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete verification stack over a throwaway database.
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<MockNotifier>,
    pub engine: VerificationEngine,
    pub donations: DonationService,
    pub settings: EngineSettings,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<Self, HarambeeError> {
        Self::builder().build().await
    }

    /// Inserts a user and a pending payment for them.
    pub async fn seed_payment(
        &self,
        reference: &str,
        user_id: i64,
        amount: i64,
    ) -> Result<Payment, HarambeeError> {
        self.seed_payment_expiring(reference, user_id, amount, self.settings.payment_expiry)
            .await
    }

    /// Like [`seed_payment`](Self::seed_payment) with an explicit lifetime
    /// from now; `Duration::ZERO` yields an already-expired payment.
    pub async fn seed_payment_expiring(
        &self,
        reference: &str,
        user_id: i64,
        amount: i64,
        lifetime: Duration,
    ) -> Result<Payment, HarambeeError> {
        self.storage
            .upsert_user(&UserUpsert {
                first_name: Some("Test".into()),
                ..UserUpsert::new(user_id)
            })
            .await?;
        let expiry = Utc::now() + TimeDelta::from_std(lifetime).unwrap_or_default();
        self.storage
            .create_payment(&NewPayment {
                internal_reference: reference.to_string(),
                gateway_reference: Some(format!("GW-{reference}")),
                checkout_id: None,
                user_id: Some(user_id),
                amount,
                currency: "KES".into(),
                phone: "0712345678".into(),
                expiry_time: Some(format_timestamp(expiry)),
            })
            .await?;
        self.payment(reference).await
    }

    /// The stored payment, failing if it does not exist.
    pub async fn payment(&self, reference: &str) -> Result<Payment, HarambeeError> {
        self.storage
            .get_payment(reference)
            .await?
            .ok_or_else(|| HarambeeError::Internal(format!("payment {reference} not found")))
    }

    /// Payer context whose chat is the user's private chat.
    pub fn context(user_id: i64) -> VerificationContext {
        VerificationContext {
            chat_id: Some(user_id),
            user_id: Some(user_id),
        }
    }
}
