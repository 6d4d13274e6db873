// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit trail of outbound notifications.

use harambee_core::HarambeeError;
use harambee_core::types::{NotificationRecord, now_timestamp};
use rusqlite::params;

use crate::database::Database;

/// Record one notification. The payment is linked by its internal reference.
pub async fn record_notification(
    db: &Database,
    record: &NotificationRecord,
) -> Result<(), HarambeeError> {
    let record = record.clone();
    db.transaction("record_notification", move |tx| {
        tx.execute(
            "INSERT INTO notifications (
                 payment_id, user_id, message_id, chat_id, notification_type, content, status,
                 created_at
             ) VALUES (
                 (SELECT id FROM payments WHERE internal_reference = ?1),
                 ?2, ?3, ?4, ?5, ?6, ?7, ?8
             )",
            params![
                record.payment_reference,
                record.user_id,
                record.message_id,
                record.chat_id,
                record.kind.to_string(),
                record.content,
                record.status.to_string(),
                now_timestamp(),
            ],
        )?;
        Ok(())
    })
    .await
}

/// Count notifications of a kind for a payment.
pub async fn count_for_payment(
    db: &Database,
    reference: &str,
    kind: &str,
) -> Result<i64, HarambeeError> {
    let reference = reference.to_string();
    let kind = kind.to_string();
    db.transaction("count_notifications", move |tx| {
        tx.query_row(
            "SELECT COUNT(*) FROM notifications n
             JOIN payments p ON p.id = n.payment_id
             WHERE p.internal_reference = ?1 AND n.notification_type = ?2",
            params![reference, kind],
            |row| row.get(0),
        )
    })
    .await
}
