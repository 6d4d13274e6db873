// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Harambee integration tests.
//!
//! Provides mock adapters and a harness wired to a throwaway SQLite
//! database, so verification scenarios run without a gateway or a chat
//! platform.
//!
//! # Components
//!
//! - [`MockGateway`] - scripted status replies with call counting
//! - [`MockNotifier`] - captures payer and operator messages
//! - [`TestHarness`] - store, mocks and engine assembled together

pub mod harness;
pub mod mock_gateway;
pub mod mock_notifier;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_gateway::MockGateway;
pub use mock_notifier::{MockNotifier, SentMessage};
