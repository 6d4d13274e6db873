// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by adapter traits and the verification engine.
//!
//! Timestamps are ISO 8601 strings (`%Y-%m-%dT%H:%M:%S%.3fZ`), the same
//! representation SQLite produces with `strftime`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Formats a UTC instant the way every timestamp column stores it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// The current instant as a stored timestamp.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parses a stored timestamp back into a UTC instant.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Gateway,
    Notifier,
}

// --- Payments ---

/// Lifecycle status of a payment row.
///
/// `Pending` is the only non-terminal state; the stored spelling of
/// `TimedOut` is `timeout`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    #[strum(serialize = "timeout")]
    #[serde(rename = "timeout")]
    TimedOut,
    Cancelled,
}

impl PaymentStatus {
    /// Every status the store accepts, in storage spelling.
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::TimedOut,
        PaymentStatus::Cancelled,
    ];

    /// Returns true for every state except `Pending`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if a row in `self` may move to `next`.
    ///
    /// Only `pending -> {completed, failed, timeout, cancelled}` is allowed.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        self == PaymentStatus::Pending && next.is_terminal()
    }
}

/// Back-office processing state of a payment, independent of the payer-facing status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A payment row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub internal_reference: String,
    pub gateway_reference: Option<String>,
    pub checkout_id: Option<String>,
    /// Receipt number the gateway reported on completion.
    pub receipt: Option<String>,
    pub user_id: Option<i64>,
    pub amount: i64,
    pub currency: String,
    pub phone: String,
    pub status: PaymentStatus,
    pub processing_status: ProcessingStatus,
    pub expiry_time: Option<String>,
    pub error_message: Option<String>,
    pub verification_attempts: i64,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

/// Fields supplied when a payment is first recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub internal_reference: String,
    pub gateway_reference: Option<String>,
    pub checkout_id: Option<String>,
    pub user_id: Option<i64>,
    pub amount: i64,
    pub currency: String,
    pub phone: String,
    pub expiry_time: Option<String>,
}

/// A partial update to a payment row. `None` fields are left untouched.
///
/// `status` is carried as a raw string so that values arriving from outside
/// the process (CLI, callbacks) are checked by the store, which rejects
/// anything not in [`PaymentStatus::ALL`] with `InvalidStatus`. A status
/// change only applies to a row that is still pending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentUpdate {
    pub status: Option<String>,
    pub processing_status: Option<ProcessingStatus>,
    pub gateway_reference: Option<String>,
    pub error_message: Option<String>,
    pub completed_at: Option<String>,
}

impl PaymentUpdate {
    /// An update that moves a pending payment into `status`.
    pub fn transition(status: PaymentStatus) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Self::default()
        }
    }

    /// Attaches an error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// What the store needs to settle a verified payment in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCompletion {
    pub reference: String,
    pub receipt: Option<String>,
    /// Channel to unlock for the payer, if the resolved tier names one.
    pub unlock: Option<ChannelGrant>,
    /// Set when the payment settled but something downstream went wrong.
    pub error_message: Option<String>,
}

/// A channel-access grant tied to a completed payment.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGrant {
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub expires_at: Option<String>,
}

// --- Users ---

/// A chat user as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: bool,
    pub last_interaction: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Upsert input for a user. `None` fields keep whatever is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpsert {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: Option<bool>,
}

impl UserUpsert {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }
}

// --- Callback routing, audit, access ---

/// Routes gateway callbacks for a phone back to the originating chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneMapping {
    pub phone: String,
    pub user_id: Option<i64>,
    pub chat_id: i64,
    pub message_id: i64,
    pub expiry: String,
}

/// One poll against the gateway for a payment, as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAttempt {
    pub payment_ref: String,
    pub attempt_number: u32,
    pub status_code: Option<u16>,
    pub response_text: Option<String>,
    pub was_successful: bool,
    pub timestamp: Option<String>,
}

/// A row of `channel_access`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccess {
    pub user_id: i64,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub access_granted: String,
    pub access_expires: Option<String>,
    pub payment_reference: Option<String>,
}

/// The reason an outbound notification was sent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Failure,
    Timeout,
    Progress,
    OperatorAlert,
}

/// Delivery outcome of a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Failed,
}

/// A notification audit row to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub payment_reference: Option<String>,
    pub user_id: Option<i64>,
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub kind: NotificationKind,
    pub content: String,
    pub status: DeliveryStatus,
}

// --- Gateway ---

/// A payment request handed to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateRequest {
    pub amount: i64,
    /// Gateway-native phone number (`2547XXXXXXXX`).
    pub phone: String,
    pub external_reference: String,
    pub customer_name: Option<String>,
}

/// The gateway's acknowledgement of an initiation request.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateResponse {
    pub gateway_reference: String,
    pub checkout_id: String,
    pub status: Option<String>,
}

/// Classified outcome of one status query.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayStatus {
    /// The payer has not completed or declined yet.
    Pending,
    /// The gateway reports the money as received.
    Completed {
        receipt: Option<String>,
        phone: Option<String>,
    },
    /// The gateway reports a definitive failure.
    Failed { reason: String },
}

/// A status reply plus the raw material kept for the attempt audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub status: GatewayStatus,
    pub http_status: u16,
    pub raw: String,
}

// --- Outbound chat ---

/// A URL button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// Identifies a delivered message on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

// --- Tiers ---

/// A reward bracket unlocked by donations in `[min, max]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tier {
    pub name: String,
    pub min: i64,
    pub max: i64,
    /// Invite link handed to payers who unlock this tier.
    #[serde(default)]
    pub invite_link: Option<String>,
    /// Chat-platform channel the tier grants access to.
    #[serde(default)]
    pub channel_id: Option<String>,
}
