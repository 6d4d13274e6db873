// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! All problems are collected; validation never stops at the first one.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::HarambeeConfig;

/// Validate a deserialized configuration.
pub fn validate_config(config: &HarambeeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }
    if config.storage.pool_size == 0 {
        fail("storage.pool_size must be at least 1".to_string());
    }
    if config.storage.schema_init_attempts == 0 {
        fail("storage.schema_init_attempts must be at least 1".to_string());
    }

    let verification = &config.verification;
    if verification.interval_secs == 0 {
        fail("verification.interval_secs must be greater than 0".to_string());
    }
    if verification.max_attempts == 0 {
        fail("verification.max_attempts must be greater than 0".to_string());
    }
    if verification.progress_every == 0 {
        fail("verification.progress_every must be greater than 0".to_string());
    }

    let donation = &config.donation;
    let currency = &donation.currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        fail(format!(
            "donation.currency must be a three-letter code, got `{currency}`"
        ));
    }
    if donation.min_amount <= 0 {
        fail(format!(
            "donation.min_amount must be positive, got {}",
            donation.min_amount
        ));
    }
    if donation.min_amount > donation.max_amount {
        fail(format!(
            "donation.min_amount ({}) exceeds donation.max_amount ({})",
            donation.min_amount, donation.max_amount
        ));
    }
    for amount in &donation.preset_amounts {
        if *amount < donation.min_amount || *amount > donation.max_amount {
            fail(format!(
                "donation.preset_amounts entry {amount} is outside [{}, {}]",
                donation.min_amount, donation.max_amount
            ));
        }
    }

    let gateway = &config.gateway;
    for (key, url) in [
        ("gateway.payments_url", Some(&gateway.payments_url)),
        ("gateway.status_base_url", Some(&gateway.status_base_url)),
        ("gateway.callback_url", gateway.callback_url.as_ref()),
    ] {
        if let Some(url) = url
            && !is_http_url(url)
        {
            fail(format!("{key} must start with http:// or https://, got `{url}`"));
        }
    }

    let mut seen_names = HashSet::new();
    for (i, tier) in config.tiers.iter().enumerate() {
        if tier.name.trim().is_empty() {
            fail(format!("tiers[{i}].name must not be empty"));
        } else if !seen_names.insert(tier.name.as_str()) {
            fail(format!("duplicate tier name `{}` in [[tiers]]", tier.name));
        }
        if tier.min > tier.max {
            fail(format!(
                "tiers[{i}] `{}` has min {} greater than max {}",
                tier.name, tier.min, tier.max
            ));
        }
        if let Some(link) = &tier.invite_link
            && link.trim().is_empty()
        {
            fail(format!(
                "tiers[{i}].invite_link must not be empty; omit it to send no link"
            ));
        }
    }

    for (i, a) in config.tiers.iter().enumerate() {
        for b in &config.tiers[i + 1..] {
            if a.min <= b.max && b.min <= a.max {
                fail(format!("tiers `{}` and `{}` overlap", a.name, b.name));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use harambee_core::types::Tier;

    fn messages(config: &HarambeeConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&HarambeeConfig::default()).is_ok());
    }

    #[test]
    fn zero_pool_size_fails_validation() {
        let mut config = HarambeeConfig::default();
        config.storage.pool_size = 0;
        assert!(messages(&config).iter().any(|m| m.contains("pool_size")));
    }

    #[test]
    fn overlapping_tiers_fail_validation() {
        let mut config = HarambeeConfig::default();
        config.tiers.push(Tier {
            name: "Lords".into(),
            min: 900,
            max: 1200,
            invite_link: None,
            channel_id: None,
        });
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("`Helpers` and `Lords` overlap")));
        assert!(msgs.iter().any(|m| m.contains("`Knights` and `Lords` overlap")));
    }

    #[test]
    fn errors_are_collected_not_fail_fast() {
        let mut config = HarambeeConfig::default();
        config.verification.interval_secs = 0;
        config.donation.currency = "KSHS".into();
        config.gateway.payments_url = "ftp://nope".into();
        config.tiers[0].invite_link = Some("  ".into());
        assert_eq!(messages(&config).len(), 4);
    }

    #[test]
    fn preset_outside_limits_fails_validation() {
        let mut config = HarambeeConfig::default();
        config.donation.preset_amounts = vec![5];
        assert!(messages(&config).iter().any(|m| m.contains("preset_amounts")));
    }
}
