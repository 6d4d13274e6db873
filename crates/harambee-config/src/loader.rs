// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/harambee/harambee.toml`, `~/.config/harambee/harambee.toml`,
//! `./harambee.toml`, then `HARAMBEE_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HarambeeConfig;

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &[
    "bot",
    "telegram",
    "storage",
    "gateway",
    "verification",
    "donation",
];

/// The TOML files consulted, lowest precedence first.
pub fn config_file_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/harambee/harambee.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("harambee/harambee.toml"));
    }
    paths.push(PathBuf::from("harambee.toml"));
    paths
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<HarambeeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no environment).
pub fn load_config_from_str(toml_content: &str) -> Result<HarambeeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HarambeeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HarambeeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HarambeeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(HarambeeConfig::default()));
    for path in config_file_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Environment provider mapping `HARAMBEE_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `HARAMBEE_TELEGRAM_BOT_TOKEN` maps to `telegram.bot_token`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("HARAMBEE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
