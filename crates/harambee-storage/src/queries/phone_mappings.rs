// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone-to-chat routing used to steer gateway callbacks back to a chat.

use harambee_core::HarambeeError;
use harambee_core::types::PhoneMapping;
use rusqlite::{OptionalExtension, params};

use crate::database::Database;

/// Store a mapping. A newer mapping for the same phone replaces the old one.
pub async fn store_mapping(db: &Database, mapping: &PhoneMapping) -> Result<(), HarambeeError> {
    let mapping = mapping.clone();
    db.transaction("store_phone_mapping", move |tx| {
        tx.execute(
            "INSERT OR REPLACE INTO phone_mappings (phone, user_id, chat_id, message_id, expiry)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                mapping.phone,
                mapping.user_id,
                mapping.chat_id,
                mapping.message_id,
                mapping.expiry,
            ],
        )?;
        Ok(())
    })
    .await
}

pub async fn get_mapping(db: &Database, phone: &str) -> Result<Option<PhoneMapping>, HarambeeError> {
    let phone = phone.to_string();
    db.transaction("get_phone_mapping", move |tx| {
        tx.query_row(
            "SELECT phone, user_id, chat_id, message_id, expiry
             FROM phone_mappings WHERE phone = ?1",
            params![phone],
            |row| {
                Ok(PhoneMapping {
                    phone: row.get(0)?,
                    user_id: row.get(1)?,
                    chat_id: row.get(2)?,
                    message_id: row.get(3)?,
                    expiry: row.get(4)?,
                })
            },
        )
        .optional()
    })
    .await
}

/// Delete mappings that expired at or before `now`.
pub async fn purge_expired(db: &Database, now: &str) -> Result<usize, HarambeeError> {
    let now = now.to_string();
    db.transaction("purge_expired_phone_mappings", move |tx| {
        tx.execute("DELETE FROM phone_mappings WHERE expiry <= ?1", params![now])
    })
    .await
}
