// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Donation initiation: validate, push the payment prompt, record, verify.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use harambee_config::model::HarambeeConfig;
use harambee_core::phone;
use harambee_core::types::{
    InitiateRequest, NewPayment, PhoneMapping, UserUpsert, format_timestamp,
};
use harambee_core::{HarambeeError, PaymentGateway, StorageAdapter};
use tracing::{error, info, warn};

use crate::engine::VerificationEngine;
use crate::messages;
use crate::registry::VerificationContext;
use crate::retry::with_retry;

/// A payer's request to donate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationRequest {
    pub user_id: i64,
    pub chat_id: i64,
    /// Message the bot is editing to show progress, if any.
    pub message_id: Option<i64>,
    /// Payer phone in national form (`07XXXXXXXX`).
    pub phone: String,
    pub amount: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// What the payer is told once the prompt is on their phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationReceipt {
    pub reference: String,
    pub gateway_reference: String,
    pub checkout_id: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationSettings {
    pub currency: String,
    pub min_amount: i64,
    pub max_amount: i64,
    pub payment_expiry: Duration,
    pub phone_mapping_ttl: Duration,
}

impl DonationSettings {
    pub fn from_config(config: &HarambeeConfig) -> Self {
        Self {
            currency: config.donation.currency.clone(),
            min_amount: config.donation.min_amount,
            max_amount: config.donation.max_amount,
            payment_expiry: Duration::from_secs(config.verification.payment_expiry_secs),
            phone_mapping_ttl: Duration::from_secs(config.donation.phone_mapping_ttl_secs),
        }
    }
}

/// Builds an internal reference: `DON-<user>-<yyyymmddHHMMSS>-<4 hex>`.
pub fn generate_reference(user_id: i64, at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "DON-{user_id}-{}-{}",
        at.format("%Y%m%d%H%M%S"),
        &suffix[..4]
    )
}

pub struct DonationService {
    store: Arc<dyn StorageAdapter>,
    gateway: Arc<dyn PaymentGateway>,
    engine: VerificationEngine,
    settings: DonationSettings,
}

impl DonationService {
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        gateway: Arc<dyn PaymentGateway>,
        engine: VerificationEngine,
        settings: DonationSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            engine,
            settings,
        }
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    /// Checks amount bounds and phone format, returning the gateway phone form.
    pub fn validate(&self, request: &DonationRequest) -> Result<String, HarambeeError> {
        let s = &self.settings;
        if request.amount < s.min_amount || request.amount > s.max_amount {
            return Err(HarambeeError::Validation(format!(
                "Amount must be between {} and {} {}",
                s.min_amount, s.max_amount, s.currency
            )));
        }
        if !phone::is_national(&request.phone) {
            return Err(HarambeeError::Validation(
                "Invalid phone number. Use format 07XXXXXXXX".into(),
            ));
        }
        phone::to_international(&request.phone).ok_or_else(|| {
            HarambeeError::Validation("Invalid phone number. Use format 07XXXXXXXX".into())
        })
    }

    /// Initiates a donation and starts verifying it.
    ///
    /// The gateway is called exactly once. Its failure is reported as
    /// [`HarambeeError::Gateway`] carrying the payer-facing text. If the
    /// accepted payment cannot be saved the operator is alerted with both
    /// references.
    pub async fn initiate(
        &self,
        request: &DonationRequest,
    ) -> Result<DonationReceipt, HarambeeError> {
        let gateway_phone = self.validate(request)?;
        self.remember_payer(request).await?;

        let now = Utc::now();
        let reference = generate_reference(request.user_id, now);
        let customer_name = match (&request.first_name, &request.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => request.username.clone(),
        };

        let accepted = self
            .gateway
            .initiate(&InitiateRequest {
                amount: request.amount,
                phone: gateway_phone,
                external_reference: reference.clone(),
                customer_name,
            })
            .await
            .map_err(|e| {
                error!(reference, error = %e, "payment initiation failed");
                HarambeeError::Gateway {
                    message: messages::SERVICE_UNAVAILABLE.to_string(),
                    source: Some(Box::new(e)),
                }
            })?;

        let expires_at =
            format_timestamp(now + TimeDelta::from_std(self.settings.payment_expiry).unwrap_or_default());
        let payment = NewPayment {
            internal_reference: reference.clone(),
            gateway_reference: Some(accepted.gateway_reference.clone()),
            checkout_id: Some(accepted.checkout_id.clone()),
            user_id: Some(request.user_id),
            amount: request.amount,
            currency: self.settings.currency.clone(),
            phone: request.phone.clone(),
            expiry_time: Some(expires_at.clone()),
        };
        let store = &self.store;
        let payment = &payment;
        let created =
            with_retry("create_payment", &reference, move || store.create_payment(payment)).await;
        if let Err(e) = created {
            // The prompt is already on the payer's phone.
            error!(reference, gateway_reference = %accepted.gateway_reference, error = %e, "accepted payment could not be saved");
            self.engine
                .alert_operator(
                    &reference,
                    messages::operator_untracked(
                        &reference,
                        &accepted.gateway_reference,
                        request.amount,
                        &self.settings.currency,
                        &request.phone,
                        &e.to_string(),
                    ),
                )
                .await;
            return Err(e);
        }

        let mapping = PhoneMapping {
            phone: request.phone.clone(),
            user_id: Some(request.user_id),
            chat_id: request.chat_id,
            message_id: request.message_id.unwrap_or_default(),
            expiry: format_timestamp(
                now + TimeDelta::from_std(self.settings.phone_mapping_ttl).unwrap_or_default(),
            ),
        };
        if let Err(e) = self.store.store_phone_mapping(&mapping).await {
            warn!(reference, error = %e, "failed to store phone mapping");
        }

        self.engine
            .start(
                &reference,
                VerificationContext {
                    chat_id: Some(request.chat_id),
                    user_id: Some(request.user_id),
                },
            )
            .await?;

        info!(
            reference,
            gateway_reference = %accepted.gateway_reference,
            amount = request.amount,
            "donation initiated"
        );
        Ok(DonationReceipt {
            reference,
            gateway_reference: accepted.gateway_reference,
            checkout_id: accepted.checkout_id,
            expires_at,
        })
    }

    /// Ensures the payer row exists, then records their phone.
    ///
    /// Phones are unique per user; a clash is logged and the donation
    /// proceeds without updating the stored phone.
    async fn remember_payer(&self, request: &DonationRequest) -> Result<(), HarambeeError> {
        self.store
            .upsert_user(&UserUpsert {
                username: request.username.clone(),
                first_name: request.first_name.clone(),
                last_name: request.last_name.clone(),
                ..UserUpsert::new(request.user_id)
            })
            .await?;
        let with_phone = UserUpsert {
            phone: Some(request.phone.clone()),
            ..UserUpsert::new(request.user_id)
        };
        if let Err(e) = self.store.upsert_user(&with_phone).await {
            warn!(user_id = request.user_id, error = %e, "could not store payer phone");
        }
        Ok(())
    }
}
