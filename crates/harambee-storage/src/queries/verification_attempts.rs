// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit log of gateway polls.

use harambee_core::HarambeeError;
use harambee_core::types::{VerificationAttempt, now_timestamp};
use rusqlite::params;

use crate::database::Database;

/// Longest response body kept per attempt, in characters.
pub const RESPONSE_TEXT_LIMIT: usize = 1000;

/// Append an attempt and bump the payment's attempt counter.
pub async fn record_attempt(
    db: &Database,
    attempt: &VerificationAttempt,
) -> Result<(), HarambeeError> {
    let attempt = attempt.clone();
    db.transaction("record_verification_attempt", move |tx| {
        let now = now_timestamp();
        let response = attempt
            .response_text
            .as_deref()
            .map(|text| text.chars().take(RESPONSE_TEXT_LIMIT).collect::<String>());
        tx.execute(
            "INSERT INTO verification_attempts (
                 payment_ref, attempt_number, timestamp, status_code, response_text, was_successful
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                attempt.payment_ref,
                attempt.attempt_number,
                attempt.timestamp.as_deref().unwrap_or(&now),
                attempt.status_code,
                response,
                attempt.was_successful,
            ],
        )?;
        tx.execute(
            "UPDATE payments SET verification_attempts = verification_attempts + 1,
                                 updated_at = ?1
             WHERE internal_reference = ?2",
            params![now, attempt.payment_ref],
        )?;
        Ok(())
    })
    .await
}

/// List every attempt recorded for a payment, in order.
pub async fn list_attempts(
    db: &Database,
    reference: &str,
) -> Result<Vec<VerificationAttempt>, HarambeeError> {
    let reference = reference.to_string();
    db.transaction("list_verification_attempts", move |tx| {
        let mut stmt = tx.prepare(
            "SELECT payment_ref, attempt_number, status_code, response_text, was_successful,
                    timestamp
             FROM verification_attempts WHERE payment_ref = ?1
             ORDER BY attempt_number, id",
        )?;
        let rows = stmt.query_map(params![reference], |row| {
            Ok(VerificationAttempt {
                payment_ref: row.get(0)?,
                attempt_number: row.get(1)?,
                status_code: row.get(2)?,
                response_text: row.get(3)?,
                was_successful: row.get(4)?,
                timestamp: row.get(5)?,
            })
        })?;
        rows.collect()
    })
    .await
}
