// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction runner on top of the connection pool.
//!
//! Each call checks out one pooled connection, opens an immediate
//! transaction, runs the closure on the connection's worker thread and
//! commits. Any error drops the transaction, which rolls it back. Failures
//! are logged with the operation name before being returned.

use harambee_core::HarambeeError;
use rusqlite::{Transaction, TransactionBehavior};
use tracing::error;

use crate::pool::ConnectionPool;

/// Convert a tokio-rusqlite error into HarambeeError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> HarambeeError {
    HarambeeError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the pooled database.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Runs `f` inside one transaction on a pooled connection.
    ///
    /// `op` names the operation in the error log.
    pub async fn transaction<F, R>(&self, op: &'static str, f: F) -> Result<R, HarambeeError>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.pool.acquire().inspect_err(|e| {
            error!(op, error = %e, "store operation could not get a connection");
        })?;
        conn.call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
        .await
        .map_err(|e| {
            let err = map_tr_err(e);
            error!(op, error = %err, "store operation failed");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tracing_test::traced_test;

    use super::*;

    async fn db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("tx.db"), 1, Duration::from_secs(5))
            .await
            .unwrap();
        (dir, Database::new(pool))
    }

    #[tokio::test]
    async fn failed_statement_rolls_back() {
        let (_dir, db) = db().await;
        db.transaction("create", |tx| tx.execute_batch("CREATE TABLE t (v INTEGER NOT NULL)"))
            .await
            .unwrap();

        let result = db
            .transaction("insert_then_fail", |tx| {
                tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
                tx.execute("INSERT INTO t (v) VALUES (NULL)", [])
            })
            .await;
        assert!(matches!(result, Err(HarambeeError::Storage { .. })));

        let rows: i64 = db
            .transaction("count", |tx| tx.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn failures_are_logged_with_operation_name() {
        let (_dir, db) = db().await;
        db.pool().close_all().await;
        let result = db
            .transaction("lookup_payment", |tx| tx.query_row("SELECT 1", [], |r| r.get::<_, i64>(0)))
            .await;
        assert!(result.is_err());
        assert!(logs_contain("lookup_payment"));
        assert!(logs_contain("could not get a connection"));
    }
}
