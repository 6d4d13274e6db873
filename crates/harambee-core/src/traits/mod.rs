// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod gateway;
pub mod notifier;
pub mod storage;

pub use adapter::PluginAdapter;
pub use gateway::PaymentGateway;
pub use notifier::NotificationSink;
pub use storage::StorageAdapter;
