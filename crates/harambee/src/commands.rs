// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: `init-db`, `donate`, `status` and `cancel`.

use harambee_config::model::HarambeeConfig;
use harambee_core::types::{Payment, VerificationAttempt};
use harambee_core::{HarambeeError, PluginAdapter, StorageAdapter};
use harambee_storage::schema;
use harambee_verify::{DonationRequest, DonationService, DonationSettings, cancel_pending};
use serde::Serialize;
use tracing::info;

use crate::serve::{build_engine, open_storage};
use crate::shutdown;

/// Run the `harambee init-db` command.
pub async fn run_init_db(config: &HarambeeConfig) -> Result<(), HarambeeError> {
    let storage = open_storage(config).await?;
    let version = schema::schema_version(storage.database()?).await;
    storage.close().await?;
    println!(
        "database ready at {} (schema version {})",
        config.storage.database_path, version?
    );
    Ok(())
}

/// Run the `harambee donate` command.
///
/// Blocks until the verification settles. A shutdown signal stops the
/// verification and leaves the payment pending for the next `serve`.
pub async fn run_donate(
    config: &HarambeeConfig,
    user_id: i64,
    chat_id: i64,
    phone: String,
    amount: i64,
) -> Result<(), HarambeeError> {
    let storage = open_storage(config).await?;
    let (engine, gateway, _notifier) = build_engine(config, storage.clone())?;
    let donations = DonationService::new(
        storage.clone(),
        gateway,
        engine.clone(),
        DonationSettings::from_config(config),
    );

    let receipt = donations
        .initiate(&DonationRequest {
            user_id,
            chat_id,
            message_id: None,
            phone,
            amount,
            username: None,
            first_name: None,
            last_name: None,
        })
        .await?;
    println!(
        "payment {} sent to the phone (gateway reference {}), expires {}",
        receipt.reference, receipt.gateway_reference, receipt.expires_at
    );

    let cancel = shutdown::install_signal_handler();
    tokio::select! {
        _ = engine.wait(&receipt.reference) => {}
        _ = cancel.cancelled() => {
            info!(reference = %receipt.reference, "interrupted, leaving payment pending");
            engine.shutdown_all().await;
        }
    }

    if let Some(payment) = storage.get_payment(&receipt.reference).await? {
        println!("{}: {}", payment.internal_reference, payment.status);
    }
    storage.close().await
}

#[derive(Debug, Serialize)]
struct StatusReport {
    payment: Payment,
    attempts: Vec<VerificationAttempt>,
}

/// Run the `harambee status` command.
pub async fn run_status(
    config: &HarambeeConfig,
    reference: &str,
    json: bool,
) -> Result<(), HarambeeError> {
    let storage = open_storage(config).await?;
    let report = load_status(storage.as_ref(), reference).await;
    storage.shutdown().await?;
    let report = report?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| HarambeeError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", render_status(&report));
    }
    Ok(())
}

async fn load_status(
    store: &dyn StorageAdapter,
    reference: &str,
) -> Result<StatusReport, HarambeeError> {
    let payment = store
        .get_payment(reference)
        .await?
        .ok_or_else(|| HarambeeError::Validation(format!("no payment with reference {reference}")))?;
    let attempts = store.list_verification_attempts(reference).await?;
    Ok(StatusReport { payment, attempts })
}

fn render_status(report: &StatusReport) -> String {
    let p = &report.payment;
    let mut out = format!(
        "reference:  {}\nstatus:     {} ({})\namount:     {} {}\nphone:      {}\ncreated:    {}\n",
        p.internal_reference,
        p.status,
        p.processing_status,
        p.amount,
        p.currency,
        p.phone,
        p.created_at,
    );
    if let Some(gateway_reference) = &p.gateway_reference {
        out.push_str(&format!("gateway:    {gateway_reference}\n"));
    }
    if let Some(receipt) = &p.receipt {
        out.push_str(&format!("receipt:    {receipt}\n"));
    }
    if let Some(completed_at) = &p.completed_at {
        out.push_str(&format!("completed:  {completed_at}\n"));
    }
    if let Some(error) = &p.error_message {
        out.push_str(&format!("error:      {error}\n"));
    }
    out.push_str(&format!("attempts:   {}\n", p.verification_attempts));
    for attempt in &report.attempts {
        out.push_str(&format!(
            "  #{:<3} {} http={} ok={}\n",
            attempt.attempt_number,
            attempt.timestamp.as_deref().unwrap_or("-"),
            attempt
                .status_code
                .map_or_else(|| "-".to_string(), |code| code.to_string()),
            attempt.was_successful,
        ));
    }
    out
}

/// Run the `harambee cancel` command.
pub async fn run_cancel(config: &HarambeeConfig, reference: &str) -> Result<(), HarambeeError> {
    let storage = open_storage(config).await?;
    let changed = cancel_pending(storage.as_ref(), reference).await;
    storage.shutdown().await?;
    if changed? {
        println!("{reference}: cancelled");
    } else {
        println!("{reference}: already settled, nothing to cancel");
    }
    Ok(())
}
