// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User lookups and field-level merge upserts.

use harambee_core::phone::is_valid_phone;
use harambee_core::types::{User, UserUpsert, now_timestamp};
use harambee_core::HarambeeError;
use rusqlite::{OptionalExtension, params};
use tracing::error;

use crate::database::Database;

/// Get a user by ID.
pub async fn get_user(db: &Database, user_id: i64) -> Result<Option<User>, HarambeeError> {
    db.transaction("get_user", move |tx| {
        tx.query_row(
            "SELECT user_id, username, first_name, last_name, phone, language_code,
                    is_premium, last_interaction, created_at, updated_at
             FROM users WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    first_name: row.get(2)?,
                    last_name: row.get(3)?,
                    phone: row.get(4)?,
                    language_code: row.get(5)?,
                    is_premium: row.get::<_, Option<bool>>(6)?.unwrap_or(false),
                    last_interaction: row.get(7)?,
                    created_at: row.get(8)?,
                    updated_at: row.get(9)?,
                })
            },
        )
        .optional()
    })
    .await
}

/// Insert or merge a user.
///
/// Each provided field overwrites the stored one; absent fields keep their
/// stored values. `last_interaction` always moves to now.
pub async fn upsert_user(db: &Database, user: &UserUpsert) -> Result<(), HarambeeError> {
    if let Some(phone) = &user.phone
        && !is_valid_phone(phone)
    {
        error!(user_id = user.user_id, "upsert_user rejected invalid phone format");
        return Err(HarambeeError::Validation(format!(
            "invalid phone format: {phone}"
        )));
    }
    let user = user.clone();
    db.transaction("upsert_user", move |tx| {
        let now = now_timestamp();
        tx.execute(
            "INSERT INTO users (
                 user_id, username, first_name, last_name, phone,
                 language_code, is_premium, last_interaction, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?8)
             ON CONFLICT(user_id) DO UPDATE SET
                 username = COALESCE(excluded.username, users.username),
                 first_name = COALESCE(excluded.first_name, users.first_name),
                 last_name = COALESCE(excluded.last_name, users.last_name),
                 phone = COALESCE(excluded.phone, users.phone),
                 language_code = COALESCE(excluded.language_code, users.language_code),
                 is_premium = COALESCE(excluded.is_premium, users.is_premium),
                 last_interaction = excluded.last_interaction,
                 updated_at = excluded.updated_at",
            params![
                user.user_id,
                user.username,
                user.first_name,
                user.last_name,
                user.phone,
                user.language_code,
                user.is_premium,
                now,
            ],
        )?;
        Ok(())
    })
    .await
}
