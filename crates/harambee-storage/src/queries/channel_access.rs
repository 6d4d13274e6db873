// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel access granted by completed payments.
//!
//! Grants are written by `payments::complete_payment`; this module reads them.

use harambee_core::HarambeeError;
use harambee_core::types::ChannelAccess;
use rusqlite::params;

use crate::database::Database;

/// Every channel a user has been granted, most recent first.
pub async fn list_channel_access(
    db: &Database,
    user_id: i64,
) -> Result<Vec<ChannelAccess>, HarambeeError> {
    db.transaction("list_channel_access", move |tx| {
        let mut stmt = tx.prepare(
            "SELECT user_id, channel_id, channel_name, access_granted, access_expires,
                    payment_reference
             FROM channel_access WHERE user_id = ?1
             ORDER BY access_granted DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(ChannelAccess {
                user_id: row.get(0)?,
                channel_id: row.get(1)?,
                channel_name: row.get(2)?,
                access_granted: row.get(3)?,
                access_expires: row.get(4)?,
                payment_reference: row.get(5)?,
            })
        })?;
        rows.collect()
    })
    .await
}
