// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the persistent store.

use async_trait::async_trait;

use crate::error::HarambeeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelAccess, NewPayment, NotificationRecord, Payment, PaymentCompletion, PaymentStatus,
    PaymentUpdate, PhoneMapping, User, UserUpsert, VerificationAttempt,
};

/// Adapter for the persistent store.
///
/// Every method runs in its own transaction: it commits on success and rolls
/// back on any failure. Failures are logged by the implementation and then
/// returned, so callers decide whether a failure matters to them.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Creates the schema if absent. Idempotent.
    async fn initialize(&self) -> Result<(), HarambeeError>;

    /// Closes the store, releasing every connection.
    async fn close(&self) -> Result<(), HarambeeError>;

    // --- Users ---

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, HarambeeError>;

    /// Inserts or merges a user. Each `Some` field overwrites the stored
    /// value; `None` fields keep it.
    async fn upsert_user(&self, user: &UserUpsert) -> Result<(), HarambeeError>;

    // --- Payments ---

    /// Records a new pending payment and returns its row id.
    ///
    /// Fails with [`HarambeeError::DuplicateReference`] if the internal
    /// reference is already present.
    async fn create_payment(&self, payment: &NewPayment) -> Result<i64, HarambeeError>;

    async fn get_payment(&self, reference: &str) -> Result<Option<Payment>, HarambeeError>;

    /// Applies a partial update. Returns whether a row changed.
    ///
    /// A status outside the allowed set fails with
    /// [`HarambeeError::InvalidStatus`] before storage is touched.
    async fn update_payment(
        &self,
        reference: &str,
        update: &PaymentUpdate,
    ) -> Result<bool, HarambeeError>;

    async fn list_payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>, HarambeeError>;

    /// Marks a pending payment completed and, in the same transaction,
    /// grants the channel access it unlocks. Returns whether the payment row
    /// changed.
    async fn complete_payment(&self, completion: &PaymentCompletion)
    -> Result<bool, HarambeeError>;

    // --- Verification audit ---

    /// Appends an attempt row and bumps the payment's attempt counter.
    async fn record_verification_attempt(
        &self,
        attempt: &VerificationAttempt,
    ) -> Result<(), HarambeeError>;

    async fn list_verification_attempts(
        &self,
        reference: &str,
    ) -> Result<Vec<VerificationAttempt>, HarambeeError>;

    // --- Phone mappings ---

    /// Stores a mapping, replacing any existing mapping for the same phone.
    async fn store_phone_mapping(&self, mapping: &PhoneMapping) -> Result<(), HarambeeError>;

    async fn get_phone_mapping(&self, phone: &str)
    -> Result<Option<PhoneMapping>, HarambeeError>;

    /// Deletes mappings whose expiry is at or before `now`. Returns the count removed.
    async fn purge_expired_phone_mappings(&self, now: &str) -> Result<usize, HarambeeError>;

    // --- Access and notifications ---

    async fn list_channel_access(&self, user_id: i64)
    -> Result<Vec<ChannelAccess>, HarambeeError>;

    async fn record_notification(
        &self,
        notification: &NotificationRecord,
    ) -> Result<(), HarambeeError>;
}
