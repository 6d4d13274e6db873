// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table.

pub mod channel_access;
pub mod notifications;
pub mod payments;
pub mod phone_mappings;
pub mod users;
pub mod verification_attempts;

use std::str::FromStr;

/// Reads a text column into a strum-parsed enum, surfacing bad values as
/// conversion errors.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use crate::database::Database;
    use crate::pool::ConnectionPool;
    use crate::schema;

    /// A freshly initialized database in a temporary directory.
    pub(crate) async fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let pool = ConnectionPool::open(dir.path().join("test.db"), 3, Duration::from_secs(5))
            .await
            .unwrap();
        let db = Database::new(pool);
        schema::initialize(&db).await.unwrap();
        (dir, db)
    }
}
