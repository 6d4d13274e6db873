// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pooled SQLite persistence for the Harambee donation bot.
//!
//! A fixed-size [`ConnectionPool`] of `tokio-rusqlite` connections backs a
//! [`Database`] that runs every operation in its own immediate transaction.
//! [`SqliteStorage`] exposes the typed query modules through the
//! `StorageAdapter` trait.

pub mod adapter;
pub mod database;
pub mod pool;
pub mod queries;
pub mod schema;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use pool::{ConnectionPool, PoolStats, PooledConnection};
