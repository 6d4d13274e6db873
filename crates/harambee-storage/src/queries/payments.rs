// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment rows: creation, lookups, guarded status transitions and the
//! completion-plus-unlock transaction.

use harambee_core::HarambeeError;
use harambee_core::types::{
    NewPayment, Payment, PaymentCompletion, PaymentStatus, PaymentUpdate, now_timestamp,
};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, error, warn};

use super::parse_column;
use crate::database::Database;

const PAYMENT_COLUMNS: &str = "id, internal_reference, gateway_reference, checkout_request_id,
    receipt_number, user_id, amount, currency, phone, status, processing_status, expiry_time,
    error_message, verification_attempts, created_at, updated_at, completed_at";

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        internal_reference: row.get(1)?,
        gateway_reference: row.get(2)?,
        checkout_id: row.get(3)?,
        receipt: row.get(4)?,
        user_id: row.get(5)?,
        amount: row.get(6)?,
        currency: row.get(7)?,
        phone: row.get(8)?,
        status: parse_column(row, 9)?,
        processing_status: parse_column(row, 10)?,
        expiry_time: row.get(11)?,
        error_message: row.get(12)?,
        verification_attempts: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
        completed_at: row.get(16)?,
    })
}

/// Record a new pending payment and return its row id.
pub async fn create_payment(db: &Database, payment: &NewPayment) -> Result<i64, HarambeeError> {
    if payment.amount <= 0 {
        error!(reference = %payment.internal_reference, amount = payment.amount, "create_payment rejected non-positive amount");
        return Err(HarambeeError::Validation(format!(
            "payment amount must be positive, got {}",
            payment.amount
        )));
    }
    let reference = payment.internal_reference.clone();
    let payment = payment.clone();
    let id = db
        .transaction("create_payment", move |tx| {
            let exists: bool = tx.query_row(
                "SELECT EXISTS (SELECT 1 FROM payments WHERE internal_reference = ?1)",
                params![payment.internal_reference],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(None);
            }
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO payments (
                     internal_reference, gateway_reference, checkout_request_id, user_id,
                     amount, currency, phone, status, processing_status, expiry_time,
                     created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', 'pending', ?8, ?9, ?9)",
                params![
                    payment.internal_reference,
                    payment.gateway_reference,
                    payment.checkout_id,
                    payment.user_id,
                    payment.amount,
                    payment.currency,
                    payment.phone,
                    payment.expiry_time,
                    now,
                ],
            )?;
            Ok(Some(tx.last_insert_rowid()))
        })
        .await?;
    match id {
        Some(id) => {
            debug!(reference = %reference, id, "payment created");
            Ok(id)
        }
        None => {
            warn!(reference = %reference, "duplicate payment reference");
            Err(HarambeeError::DuplicateReference(reference))
        }
    }
}

/// Get a payment by internal reference.
pub async fn get_payment(db: &Database, reference: &str) -> Result<Option<Payment>, HarambeeError> {
    let reference = reference.to_string();
    db.transaction("get_payment", move |tx| {
        tx.query_row(
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE internal_reference = ?1"),
            params![reference],
            payment_from_row,
        )
        .optional()
    })
    .await
}

/// List payments in a status, oldest first.
pub async fn list_payments_by_status(
    db: &Database,
    status: PaymentStatus,
) -> Result<Vec<Payment>, HarambeeError> {
    let status = status.to_string();
    db.transaction("list_payments_by_status", move |tx| {
        let mut stmt = tx.prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![status], payment_from_row)?;
        rows.collect()
    })
    .await
}

/// Apply a partial update to a payment.
///
/// A status outside the allowed set fails with `InvalidStatus` before
/// storage is touched. A status change only matches rows that are still
/// pending, so terminal rows never move. Returns whether a row changed.
pub async fn update_payment(
    db: &Database,
    reference: &str,
    update: &PaymentUpdate,
) -> Result<bool, HarambeeError> {
    let status = match update.status.as_deref() {
        Some(raw) => match raw.parse::<PaymentStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                error!(reference = %reference, status = raw, "update_payment rejected invalid status");
                return Err(HarambeeError::InvalidStatus(raw.to_string()));
            }
        },
        None => None,
    };

    let mut fields: Vec<(&str, Value)> = Vec::new();
    if let Some(status) = status {
        fields.push(("status", Value::Text(status.to_string())));
    }
    if let Some(processing) = update.processing_status {
        fields.push(("processing_status", Value::Text(processing.to_string())));
    }
    if let Some(gateway_reference) = &update.gateway_reference {
        fields.push(("gateway_reference", Value::Text(gateway_reference.clone())));
    }
    if let Some(message) = &update.error_message {
        fields.push(("error_message", Value::Text(message.clone())));
    }
    if let Some(completed_at) = &update.completed_at {
        fields.push(("completed_at", Value::Text(completed_at.clone())));
    }
    if fields.is_empty() {
        return Ok(false);
    }
    fields.push(("updated_at", Value::Text(now_timestamp())));

    let sets: Vec<String> = fields
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
        .collect();
    let mut values: Vec<Value> = fields.into_iter().map(|(_, value)| value).collect();
    values.push(Value::Text(reference.to_string()));
    let mut sql = format!(
        "UPDATE payments SET {} WHERE internal_reference = ?{}",
        sets.join(", "),
        values.len()
    );
    if status.is_some() {
        sql.push_str(" AND status = 'pending'");
    }

    let changed = db
        .transaction("update_payment", move |tx| {
            tx.execute(&sql, params_from_iter(values))
        })
        .await?;
    debug!(reference = %reference, changed, "payment updated");
    Ok(changed > 0)
}

/// Mark a pending payment completed and grant the channel access it unlocks,
/// in one transaction.
///
/// Returns `false` without granting anything if the payment was not pending.
pub async fn complete_payment(
    db: &Database,
    completion: &PaymentCompletion,
) -> Result<bool, HarambeeError> {
    let completion = completion.clone();
    db.transaction("complete_payment", move |tx| {
        let now = now_timestamp();
        let changed = tx.execute(
            "UPDATE payments SET
                 status = 'completed',
                 processing_status = 'completed',
                 receipt_number = COALESCE(?1, receipt_number),
                 error_message = ?2,
                 completed_at = ?3,
                 updated_at = ?3
             WHERE internal_reference = ?4 AND status = 'pending'",
            params![completion.receipt, completion.error_message, now, completion.reference],
        )?;
        if changed == 0 {
            return Ok(false);
        }
        let Some(grant) = &completion.unlock else {
            return Ok(true);
        };
        let user_id: Option<i64> = tx.query_row(
            "SELECT user_id FROM payments WHERE internal_reference = ?1",
            params![completion.reference],
            |row| row.get(0),
        )?;
        if let Some(user_id) = user_id {
            tx.execute(
                "INSERT INTO channel_access (
                     user_id, channel_id, channel_name, access_granted, access_expires,
                     payment_reference
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, channel_id) DO UPDATE SET
                     channel_name = COALESCE(excluded.channel_name, channel_access.channel_name),
                     access_granted = excluded.access_granted,
                     access_expires = excluded.access_expires,
                     payment_reference = excluded.payment_reference",
                params![
                    user_id,
                    grant.channel_id,
                    grant.channel_name,
                    now,
                    grant.expires_at,
                    completion.reference,
                ],
            )?;
        }
        Ok(true)
    })
    .await
}
