// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait shared by storage, gateway and notifier backends.

use async_trait::async_trait;

use crate::error::HarambeeError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, lifecycle and health for every adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, HarambeeError>;

    /// Releases any held resources (connections, HTTP pools).
    async fn shutdown(&self) -> Result<(), HarambeeError>;
}
