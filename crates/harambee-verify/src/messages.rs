// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Texts sent to payers and to the operator channel.

use harambee_core::types::{Payment, PaymentStatus};

use crate::tier::TierMatch;

/// Shown to the payer when the gateway cannot be reached.
pub const SERVICE_UNAVAILABLE: &str = "Payment service unavailable. Please try again later.";

/// Shown when a payment settled but could not be matched to a tier or recorded.
pub const VERIFIED_WITH_ERROR: &str =
    "⚠️ Payment verified but we encountered an error. Please contact support.";

/// The trailing eight characters of a reference, as shown to payers.
pub fn short_ref(reference: &str) -> &str {
    let start = reference
        .char_indices()
        .rev()
        .nth(7)
        .map_or(0, |(i, _)| i);
    &reference[start..]
}

pub fn success(
    payment: &Payment,
    receipt: Option<&str>,
    phone: Option<&str>,
    tier: &TierMatch<'_>,
) -> String {
    let mut lines = vec![
        "✅ Payment verified successfully!".to_string(),
        format!("Amount: {} {}", payment.amount, payment.currency),
        format!("Receipt: {}", receipt.unwrap_or("N/A")),
        format!("Phone: {}", phone.unwrap_or(&payment.phone)),
        format!("Reference: {}", short_ref(&payment.internal_reference)),
        String::new(),
        format!("🎉 You've unlocked the {} tier!", tier.tier.name),
    ];
    if tier.tier.invite_link.is_some() {
        lines.push(String::new());
        lines.push(format!("Join the {} group with the button below.", tier.tier.name));
    }
    if let Some(next) = &tier.next {
        lines.push(String::new());
        lines.push(format!(
            "💎 Need {} more to unlock {} tier!",
            next.remaining, next.tier.name
        ));
    }
    lines.join("\n")
}

pub fn failure(payment: &Payment, reason: &str) -> String {
    format!(
        "❌ Payment Failed\n\nReason: {reason}\nReference: {}\nAmount: {} {}\n\nPlease try again with /donate",
        short_ref(&payment.internal_reference),
        payment.amount,
        payment.currency
    )
}

pub fn timeout(payment: &Payment, support: &str) -> String {
    format!(
        "⚠️ Payment Verification Timeout\n\n\
         We couldn't verify your payment status within the expected time.\n\
         If you completed the payment, please contact @{support} with:\n\
         - Reference: {}\n\
         - Amount: {} {}\n\
         - Phone: {}",
        short_ref(&payment.internal_reference),
        payment.amount,
        payment.currency,
        payment.phone
    )
}

/// Percentage of the attempt budget used, capped at 100.
pub fn progress_percent(attempt: u32, max_attempts: u32) -> u32 {
    if max_attempts == 0 {
        return 100;
    }
    (attempt.saturating_mul(100) / max_attempts).min(100)
}

pub fn progress(reference: &str, attempt: u32, max_attempts: u32) -> String {
    format!(
        "⏳ Payment Verification Progress: {}%\nAttempt {attempt} of {max_attempts}\nReference: {}\n\nPlease wait while we confirm your payment...",
        progress_percent(attempt, max_attempts),
        short_ref(reference)
    )
}

fn operator_details(payment: &Payment) -> String {
    format!(
        "Reference: {}\nGateway reference: {}\nAmount: {} {}\nPhone: {}\nUser: {}",
        payment.internal_reference,
        payment.gateway_reference.as_deref().unwrap_or("N/A"),
        payment.amount,
        payment.currency,
        payment.phone,
        payment
            .user_id
            .map_or_else(|| "unknown".to_string(), |id| id.to_string())
    )
}

pub fn operator_timeout(payment: &Payment, attempts: u32) -> String {
    format!(
        "🚨 Payment verification timed out after {attempts} attempts\n\n{}",
        operator_details(payment)
    )
}

pub fn operator_expired(payment: &Payment) -> String {
    format!(
        "🚨 Pending payment expired while the bot was offline\n\n{}",
        operator_details(payment)
    )
}

pub fn operator_no_tier(payment: &Payment) -> String {
    format!(
        "🚨 Payment verified but no reward tier matches the amount\n\n{}",
        operator_details(payment)
    )
}

pub fn operator_unrecorded(payment: &Payment, error: &str) -> String {
    format!(
        "🚨 Payment verified but could not be recorded: {error}\n\n{}",
        operator_details(payment)
    )
}

/// Verification ended as `status` but the row is still pending.
pub fn operator_status_unrecorded(payment: &Payment, status: PaymentStatus, error: &str) -> String {
    format!(
        "🚨 Payment outcome ({status}) could not be recorded: {error}\n\n{}",
        operator_details(payment)
    )
}

/// The payer got a payment prompt but no payment row exists to track it.
pub fn operator_untracked(
    reference: &str,
    gateway_reference: &str,
    amount: i64,
    currency: &str,
    phone: &str,
    error: &str,
) -> String {
    format!(
        "🚨 Payment prompt sent but the payment could not be saved: {error}\n\nReference: {reference}\nGateway reference: {gateway_reference}\nAmount: {amount} {currency}\nPhone: {phone}"
    )
}
