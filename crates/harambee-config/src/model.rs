// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use harambee_core::types::Tier;
use serde::{Deserialize, Serialize};

/// Top-level Harambee configuration. Every section has defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HarambeeConfig {
    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub verification: VerificationConfig,

    #[serde(default)]
    pub donation: DonationConfig,

    /// Reward tiers, ordered by amount. Ranges must not overlap.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<Tier>,
}

impl Default for HarambeeConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            telegram: TelegramConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            verification: VerificationConfig::default(),
            donation: DonationConfig::default(),
            tiers: default_tiers(),
        }
    }
}

/// Bot identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_bot_name() -> String {
    "harambee".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram delivery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. Required by `serve`.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Chat that receives operator alerts (timeouts, unmatched tiers).
    #[serde(default)]
    pub admin_chat_id: Option<i64>,

    /// Handle payers are told to contact, without the leading `@`.
    #[serde(default = "default_support_username")]
    pub support_username: String,

    /// How many times each outbound message is attempted.
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_chat_id: None,
            support_username: default_support_username(),
            send_retries: default_send_retries(),
        }
    }
}

fn default_support_username() -> String {
    "harambee_support".to_string()
}

fn default_send_retries() -> u32 {
    3
}

/// SQLite storage and connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Fixed number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,

    /// Period of the idle-connection health monitor. `0` disables it.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    #[serde(default = "default_schema_init_attempts")]
    pub schema_init_attempts: u32,

    #[serde(default = "default_schema_init_backoff_ms")]
    pub schema_init_backoff_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            pool_size: default_pool_size(),
            busy_timeout_secs: default_busy_timeout_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
            schema_init_attempts: default_schema_init_attempts(),
            schema_init_backoff_ms: default_schema_init_backoff_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("harambee").join("harambee.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("harambee.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_pool_size() -> usize {
    5
}

fn default_busy_timeout_secs() -> u64 {
    30
}

fn default_health_check_interval_secs() -> u64 {
    60
}

fn default_schema_init_attempts() -> u32 {
    3
}

fn default_schema_init_backoff_ms() -> u64 {
    1000
}

/// Mobile-money gateway endpoints and credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Endpoint that accepts payment initiation requests.
    #[serde(default = "default_payments_url")]
    pub payments_url: String,

    /// Base URL of the status service; `/api/verify_payment` is appended.
    #[serde(default = "default_status_base_url")]
    pub status_base_url: String,

    /// Basic-auth credential for initiation. A missing `Basic ` prefix is added.
    #[serde(default)]
    pub api_key: Option<String>,

    /// `X-API-KEY` token for status queries.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub channel_id: Option<i64>,

    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default)]
    pub callback_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            payments_url: default_payments_url(),
            status_base_url: default_status_base_url(),
            api_key: None,
            auth_token: None,
            channel_id: None,
            provider: default_provider(),
            callback_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_payments_url() -> String {
    "https://backend.payhero.co.ke/api/v2/payments".to_string()
}

fn default_status_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_provider() -> String {
    "m-pesa".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Polling cadence of the verification engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Inconclusive polls allowed before a payment times out.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// A progress message is sent every this many attempts.
    #[serde(default = "default_progress_every")]
    pub progress_every: u32,

    /// Stored as the payment's expiry; consulted when resuming after a restart.
    #[serde(default = "default_payment_expiry_secs")]
    pub payment_expiry_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
            progress_every: default_progress_every(),
            payment_expiry_secs: default_payment_expiry_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    6
}

fn default_progress_every() -> u32 {
    3
}

fn default_payment_expiry_secs() -> u64 {
    300
}

/// Donation amount limits and currency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DonationConfig {
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_min_amount")]
    pub min_amount: i64,

    #[serde(default = "default_max_amount")]
    pub max_amount: i64,

    /// Amounts offered as one-tap choices.
    #[serde(default = "default_preset_amounts")]
    pub preset_amounts: Vec<i64>,

    /// Lifetime of the phone-to-chat routing entry written at initiation.
    #[serde(default = "default_phone_mapping_ttl_secs")]
    pub phone_mapping_ttl_secs: u64,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            preset_amounts: default_preset_amounts(),
            phone_mapping_ttl_secs: default_phone_mapping_ttl_secs(),
        }
    }
}

fn default_currency() -> String {
    "KES".to_string()
}

fn default_min_amount() -> i64 {
    10
}

fn default_max_amount() -> i64 {
    150_000
}

fn default_preset_amounts() -> Vec<i64> {
    vec![100, 500, 1000, 5000]
}

fn default_phone_mapping_ttl_secs() -> u64 {
    3600
}

fn default_tiers() -> Vec<Tier> {
    [("Helpers", 10, 999), ("Knights", 1000, 49_999), ("Kings", 50_000, 150_000)]
        .into_iter()
        .map(|(name, min, max)| Tier {
            name: name.to_string(),
            min,
            max,
            invite_link: None,
            channel_id: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HarambeeConfig::default();
        assert_eq!(config.storage.pool_size, 5);
        assert_eq!(config.verification.interval_secs, 15);
        assert_eq!(config.verification.max_attempts, 6);
        assert_eq!(config.verification.progress_every, 3);
        assert_eq!(config.donation.currency, "KES");
        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.tiers[1].name, "Knights");
        assert_eq!(config.tiers[1].min, 1000);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: HarambeeConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.provider, "m-pesa");
        assert_eq!(config.storage.schema_init_attempts, 3);
        assert_eq!(config.tiers.len(), 3);
    }
}
