// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema bootstrap.
//!
//! The `schema_meta` table marks an initialized database. When it is absent
//! the whole schema is created in one transaction and the version is
//! recorded both in `schema_meta` and in `PRAGMA user_version`.

use std::time::Duration;

use harambee_core::HarambeeError;
use tracing::{info, warn};

use crate::database::Database;

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE users (
    user_id INTEGER PRIMARY KEY,
    username TEXT COLLATE NOCASE,
    first_name TEXT,
    last_name TEXT,
    phone TEXT UNIQUE COLLATE NOCASE,
    language_code TEXT,
    is_premium BOOLEAN DEFAULT 0,
    last_interaction TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    CONSTRAINT phone_format CHECK (
        phone IS NULL OR
        (phone GLOB '+[0-9]*' AND substr(phone, 2) NOT GLOB '*[^0-9]*') OR
        phone GLOB '07[0-9][0-9][0-9][0-9][0-9][0-9][0-9][0-9]' OR
        phone GLOB '2547[0-9][0-9][0-9][0-9][0-9][0-9][0-9][0-9]'
    )
);

CREATE TABLE payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    internal_reference TEXT NOT NULL UNIQUE COLLATE NOCASE,
    gateway_reference TEXT,
    checkout_request_id TEXT,
    receipt_number TEXT,
    user_id INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    currency TEXT NOT NULL DEFAULT 'KES' CHECK (length(currency) = 3),
    phone TEXT NOT NULL COLLATE NOCASE,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'completed', 'failed', 'timeout', 'cancelled')),
    processing_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (processing_status IN ('pending', 'processing', 'completed', 'failed')),
    error_message TEXT,
    verification_attempts INTEGER NOT NULL DEFAULT 0 CHECK (verification_attempts >= 0),
    expiry_time TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    completed_at TEXT
);

CREATE TRIGGER payments_amount_immutable
BEFORE UPDATE OF amount ON payments
WHEN NEW.amount IS NOT OLD.amount
BEGIN
    SELECT RAISE(ABORT, 'payment amount is immutable');
END;

CREATE TABLE notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_id INTEGER REFERENCES payments(id) ON DELETE CASCADE,
    user_id INTEGER REFERENCES users(user_id) ON DELETE CASCADE,
    message_id INTEGER,
    chat_id INTEGER,
    notification_type TEXT NOT NULL,
    content TEXT,
    status TEXT NOT NULL DEFAULT 'sent' CHECK (status IN ('sent', 'delivered', 'failed')),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE channel_access (
    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    channel_id TEXT NOT NULL,
    channel_name TEXT,
    access_granted TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    access_expires TEXT,
    payment_reference TEXT REFERENCES payments(internal_reference) ON DELETE SET NULL,
    PRIMARY KEY (user_id, channel_id)
) WITHOUT ROWID;

CREATE TABLE phone_mappings (
    phone TEXT PRIMARY KEY COLLATE NOCASE,
    user_id INTEGER REFERENCES users(user_id) ON DELETE CASCADE,
    chat_id INTEGER NOT NULL,
    message_id INTEGER NOT NULL,
    expiry TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE TABLE verification_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payment_ref TEXT NOT NULL REFERENCES payments(internal_reference) ON DELETE CASCADE,
    attempt_number INTEGER NOT NULL,
    timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    status_code INTEGER,
    response_text TEXT,
    was_successful BOOLEAN NOT NULL DEFAULT 0
);

CREATE INDEX idx_verification_attempts_payment ON verification_attempts(payment_ref);
CREATE INDEX idx_payments_ref_status ON payments(internal_reference, status);
CREATE INDEX idx_payments_phone ON payments(phone);
CREATE INDEX idx_payments_processing ON payments(processing_status);
CREATE INDEX idx_users_phone ON users(phone) WHERE phone IS NOT NULL;
CREATE INDEX idx_phone_mappings_expiry ON phone_mappings(expiry);
CREATE INDEX idx_notifications_user ON notifications(user_id);
CREATE INDEX idx_channel_access_expires ON channel_access(access_expires)
    WHERE access_expires IS NOT NULL;

CREATE TABLE schema_meta (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
";

/// Creates the schema if the marker table is missing.
///
/// Returns `true` if the schema was created, `false` if it already existed.
pub async fn initialize(db: &Database) -> Result<bool, HarambeeError> {
    let created = db
        .transaction("initialize_schema", |tx| {
            let present: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_meta')",
                [],
                |row| row.get(0),
            )?;
            if present {
                return Ok(false);
            }
            tx.execute_batch(SCHEMA_V1)?;
            tx.execute(
                "INSERT INTO schema_meta (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            Ok(true)
        })
        .await?;
    if created {
        info!(version = SCHEMA_VERSION, "database schema created");
    }
    Ok(created)
}

/// Runs [`initialize`] up to `attempts` times, sleeping `backoff` between tries.
///
/// Exhausting the attempts yields [`HarambeeError::SchemaInit`], which
/// callers treat as fatal.
pub async fn initialize_with_retry(
    db: &Database,
    attempts: u32,
    backoff: Duration,
) -> Result<(), HarambeeError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match initialize(db).await {
            Ok(_) => return Ok(()),
            Err(e) if attempt >= attempts => {
                return Err(HarambeeError::SchemaInit {
                    attempts,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "schema initialization failed, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Reads the schema version recorded in `PRAGMA user_version`.
pub async fn schema_version(db: &Database) -> Result<u32, HarambeeError> {
    db.transaction("schema_version", |tx| {
        tx.pragma_query_value(None, "user_version", |row| row.get(0))
    })
    .await
}
