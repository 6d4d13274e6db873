// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The payment verification engine.
//!
//! Every pending payment gets one polling task. The task sleeps for the
//! configured interval, asks the gateway for the payment's status and
//! records the attempt, until the gateway gives a definite answer or the
//! attempt budget runs out. It then persists the terminal status, tells
//! the payer (and the operator where needed) and removes itself from the
//! registry. The loop is bounded by attempt count, not by wall-clock time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use harambee_config::model::HarambeeConfig;
use harambee_core::types::{
    ChannelGrant, DeliveryStatus, GatewayReply, GatewayStatus, LinkButton, NotificationKind,
    NotificationRecord, Payment, PaymentCompletion, PaymentStatus, PaymentUpdate,
    ProcessingStatus, VerificationAttempt, parse_timestamp,
};
use harambee_core::{HarambeeError, NotificationSink, PaymentGateway, StorageAdapter};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::messages;
use crate::retry::with_retry;
use crate::registry::{
    ActiveSummary, Registration, Registry, StopReason, StopSignal, VerificationContext,
};
use crate::tier::TierTable;

/// Error message stored on payments the payer cancelled.
pub const USER_CANCELLED: &str = "User cancelled";

/// Polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Send a progress update every this many inconclusive polls.
    pub progress_every: u32,
    /// Lifetime of a pending payment, used when recovering after a restart.
    pub payment_expiry: Duration,
    pub support_username: String,
}

impl EngineSettings {
    pub fn from_config(config: &HarambeeConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.verification.interval_secs),
            max_attempts: config.verification.max_attempts,
            progress_every: config.verification.progress_every,
            payment_expiry: Duration::from_secs(config.verification.payment_expiry_secs),
            support_username: config.telegram.support_username.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&HarambeeConfig::default())
    }
}

/// Counts from [`VerificationEngine::resume_pending`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub resumed: usize,
    pub expired: usize,
    pub skipped: usize,
}

enum PollOutcome {
    Completed {
        receipt: Option<String>,
        phone: Option<String>,
    },
    Failed {
        reason: String,
    },
    Exhausted {
        attempts: u32,
    },
    Stopped(StopReason),
}

/// Result of persisting a terminal status.
enum Persisted {
    Applied,
    /// The row had already left `pending`.
    AlreadySettled,
    /// Retries ran out; the row is still `pending`.
    Unrecorded(HarambeeError),
}

struct EngineInner {
    store: Arc<dyn StorageAdapter>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    tiers: TierTable,
    settings: EngineSettings,
    registry: Registry,
    shutting_down: AtomicBool,
}

/// Runs and supervises payment verifications. Cheap to clone.
#[derive(Clone)]
pub struct VerificationEngine {
    inner: Arc<EngineInner>,
}

impl VerificationEngine {
    pub fn new(
        store: Arc<dyn StorageAdapter>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
        tiers: TierTable,
        settings: EngineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                gateway,
                notifier,
                tiers,
                settings,
                registry: Registry::default(),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn tiers(&self) -> &TierTable {
        &self.inner.tiers
    }

    /// Starts verifying the pending payment `reference`.
    ///
    /// Fails with [`HarambeeError::DuplicateVerification`] if a verification
    /// for the reference is already registered, and with
    /// [`HarambeeError::ShuttingDown`] once [`shutdown_all`](Self::shutdown_all)
    /// has begun.
    pub async fn start(
        &self,
        reference: &str,
        context: VerificationContext,
    ) -> Result<(), HarambeeError> {
        if self.is_shutting_down() {
            return Err(HarambeeError::ShuttingDown);
        }
        let payment = self
            .inner
            .store
            .get_payment(reference)
            .await?
            .ok_or_else(|| HarambeeError::Validation(format!("unknown payment {reference}")))?;
        if payment.status != PaymentStatus::Pending {
            return Err(HarambeeError::Validation(format!(
                "payment {reference} is already {}",
                payment.status
            )));
        }

        let inner = Arc::clone(&self.inner);
        let task_context = context.clone();
        let registration = self.inner.registry.register(
            reference,
            context,
            || !self.is_shutting_down(),
            move |stop, _done| {
                let span = info_span!("verification", reference = %payment.internal_reference);
                tokio::spawn(run_verification(inner, payment, task_context, stop).instrument(span))
            },
        );

        match registration {
            Registration::Registered => {
                info!(reference, "verification started");
                Ok(())
            }
            Registration::Duplicate => {
                warn!(reference, "verification already running, start rejected");
                Err(HarambeeError::DuplicateVerification(reference.to_string()))
            }
            Registration::Closed => Err(HarambeeError::ShuttingDown),
        }
    }

    /// Cancels the payment `reference` on the payer's behalf.
    ///
    /// A running verification is stopped and awaited; it marks the payment
    /// cancelled before it deregisters. Without a running verification the
    /// row is cancelled directly if still pending. Returns whether the
    /// payment ended up cancelled, which is false when the verification
    /// settled it first.
    pub async fn cancel(&self, reference: &str) -> Result<bool, HarambeeError> {
        if let Some(stopping) = self.inner.registry.stop(reference, StopReason::UserCancel) {
            stopping.finished().await;
            let cancelled = self
                .inner
                .store
                .get_payment(reference)
                .await?
                .is_some_and(|p| p.status == PaymentStatus::Cancelled);
            if cancelled {
                info!(reference, "verification cancelled");
            } else {
                info!(reference, "verification settled before the cancel took effect");
            }
            return Ok(cancelled);
        }

        cancel_pending(self.inner.store.as_ref(), reference).await
    }

    /// Stops every running verification and refuses new ones.
    ///
    /// Stopped payments stay pending so [`resume_pending`](Self::resume_pending)
    /// picks them up on the next start.
    pub async fn shutdown_all(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        let stopping = self.inner.registry.stop_all(StopReason::Shutdown);
        info!(count = stopping.len(), "stopping active verifications");
        for task in stopping {
            task.finished().await;
        }
        if let Err(e) = self.inner.gateway.shutdown().await {
            warn!(error = %e, "gateway shutdown failed");
        }
        info!("verification engine stopped");
    }

    /// Waits until the verification for `reference` has finished.
    /// Returns immediately if none is running.
    pub async fn wait(&self, reference: &str) {
        if let Some(done) = self.inner.registry.done_token(reference) {
            done.cancelled().await;
        }
    }

    pub fn is_active(&self, reference: &str) -> bool {
        self.inner.registry.contains(reference)
    }

    pub fn active_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn active_verifications(&self) -> Vec<ActiveSummary> {
        self.inner.registry.snapshot()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Sends `text` to the operator channel and records it against `reference`.
    pub(crate) async fn alert_operator(&self, reference: &str, text: String) {
        self.inner.notify_operator(reference, text).await;
    }

    /// Picks up payments left pending by a previous run.
    ///
    /// Payments whose expiry lies in the future are verified again with a
    /// fresh attempt budget; the rest are marked timed out and reported to
    /// the operator.
    pub async fn resume_pending(&self) -> Result<ResumeReport, HarambeeError> {
        let pending = self
            .inner
            .store
            .list_payments_by_status(PaymentStatus::Pending)
            .await?;
        let now = Utc::now();
        let lifetime = TimeDelta::from_std(self.inner.settings.payment_expiry).unwrap_or_default();
        let mut report = ResumeReport::default();

        for payment in pending {
            let context = self.inner.recover_context(&payment).await;
            let deadline = payment
                .expiry_time
                .as_deref()
                .and_then(parse_timestamp)
                .or_else(|| parse_timestamp(&payment.created_at).map(|at| at + lifetime));

            if deadline.is_none_or(|deadline| deadline <= now) {
                self.inner.expire(&payment, &context).await;
                report.expired += 1;
                continue;
            }
            match self.start(&payment.internal_reference, context).await {
                Ok(()) => report.resumed += 1,
                Err(e) => {
                    warn!(reference = %payment.internal_reference, error = %e, "could not resume verification");
                    report.skipped += 1;
                }
            }
        }

        info!(
            resumed = report.resumed,
            expired = report.expired,
            skipped = report.skipped,
            "pending payments recovered"
        );
        Ok(report)
    }
}

/// Deregisters its reference when dropped, so a task leaves the registry
/// on every exit path.
struct Deregister {
    inner: Arc<EngineInner>,
    reference: String,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.inner.registry.deregister(&self.reference);
        debug!(reference = %self.reference, "verification deregistered");
    }
}

async fn run_verification(
    inner: Arc<EngineInner>,
    payment: Payment,
    context: VerificationContext,
    stop: StopSignal,
) {
    let _deregister = Deregister {
        inner: Arc::clone(&inner),
        reference: payment.internal_reference.clone(),
    };
    let outcome = inner.poll(&payment.internal_reference, &context, &stop).await;
    inner.settle(&payment, &context, outcome).await;
}

/// Marks a still-pending payment cancelled without touching any running task.
///
/// Returns whether the row changed. An unknown reference is
/// [`HarambeeError::VerificationNotFound`].
pub async fn cancel_pending(
    store: &dyn StorageAdapter,
    reference: &str,
) -> Result<bool, HarambeeError> {
    let changed = store
        .update_payment(reference, &terminal_update(PaymentStatus::Cancelled, USER_CANCELLED))
        .await?;
    if !changed && store.get_payment(reference).await?.is_none() {
        return Err(HarambeeError::VerificationNotFound(reference.to_string()));
    }
    if changed {
        info!(reference, "pending payment cancelled");
    }
    Ok(changed)
}

fn terminal_update(status: PaymentStatus, message: &str) -> PaymentUpdate {
    PaymentUpdate {
        processing_status: Some(ProcessingStatus::Failed),
        ..PaymentUpdate::transition(status).with_error(message)
    }
}

impl EngineInner {
    async fn poll(
        &self,
        reference: &str,
        context: &VerificationContext,
        stop: &StopSignal,
    ) -> PollOutcome {
        let max_attempts = self.settings.max_attempts;
        let mut attempt = 0;

        while attempt < max_attempts {
            tokio::select! {
                biased;
                reason = stop.stopped() => return PollOutcome::Stopped(reason),
                () = tokio::time::sleep(self.settings.interval) => {}
            }
            let result = tokio::select! {
                biased;
                reason = stop.stopped() => return PollOutcome::Stopped(reason),
                result = self.gateway.get_status(reference) => result,
            };
            attempt += 1;
            self.record_attempt(reference, attempt, &result).await;

            match result {
                Ok(GatewayReply {
                    status: GatewayStatus::Completed { receipt, phone },
                    ..
                }) => return PollOutcome::Completed { receipt, phone },
                Ok(GatewayReply {
                    status: GatewayStatus::Failed { reason },
                    ..
                }) => return PollOutcome::Failed { reason },
                Ok(_) => debug!(attempt, max_attempts, "payment still pending"),
                Err(e) => warn!(attempt, max_attempts, error = %e, "status query inconclusive"),
            }

            if self.settings.progress_every > 0
                && attempt % self.settings.progress_every == 0
                && attempt < max_attempts
            {
                self.notify_user(
                    reference,
                    context,
                    NotificationKind::Progress,
                    messages::progress(reference, attempt, max_attempts),
                    &[],
                )
                .await;
            }
        }
        PollOutcome::Exhausted { attempts: attempt }
    }

    async fn settle(&self, payment: &Payment, context: &VerificationContext, outcome: PollOutcome) {
        let reference = payment.internal_reference.as_str();
        match outcome {
            PollOutcome::Completed { receipt, phone } => {
                self.settle_completed(payment, context, receipt, phone).await;
            }
            PollOutcome::Failed { reason } => {
                info!(reference, reason = %reason, "gateway reported payment failure");
                let persisted = self
                    .transition(reference, terminal_update(PaymentStatus::Failed, &reason))
                    .await;
                if !matches!(persisted, Persisted::AlreadySettled) {
                    self.notify_user(
                        reference,
                        context,
                        NotificationKind::Failure,
                        messages::failure(payment, &reason),
                        &[],
                    )
                    .await;
                }
                self.report_unrecorded(payment, PaymentStatus::Failed, persisted)
                    .await;
            }
            PollOutcome::Exhausted { attempts } => {
                warn!(reference, attempts, "verification attempts exhausted");
                let message = format!("verification timed out after {attempts} attempts");
                let persisted = self
                    .transition(reference, terminal_update(PaymentStatus::TimedOut, &message))
                    .await;
                if matches!(persisted, Persisted::AlreadySettled) {
                    return;
                }
                self.notify_user(
                    reference,
                    context,
                    NotificationKind::Timeout,
                    messages::timeout(payment, &self.settings.support_username),
                    &[],
                )
                .await;
                match persisted {
                    Persisted::Applied => {
                        self.notify_operator(
                            reference,
                            messages::operator_timeout(payment, attempts),
                        )
                        .await;
                    }
                    other => {
                        self.report_unrecorded(payment, PaymentStatus::TimedOut, other)
                            .await;
                    }
                }
            }
            PollOutcome::Stopped(StopReason::UserCancel) => {
                let persisted = self
                    .transition(
                        reference,
                        terminal_update(PaymentStatus::Cancelled, USER_CANCELLED),
                    )
                    .await;
                self.report_unrecorded(payment, PaymentStatus::Cancelled, persisted)
                    .await;
            }
            PollOutcome::Stopped(StopReason::Shutdown) => {
                info!(reference, "verification interrupted by shutdown, payment left pending");
            }
        }
    }

    async fn settle_completed(
        &self,
        payment: &Payment,
        context: &VerificationContext,
        receipt: Option<String>,
        phone: Option<String>,
    ) {
        let reference = payment.internal_reference.as_str();
        let tier = self.tiers.resolve_or_err(payment.amount);
        let completion = PaymentCompletion {
            reference: reference.to_string(),
            receipt: receipt.clone(),
            unlock: tier.as_ref().ok().and_then(|m| {
                m.tier.channel_id.clone().map(|channel_id| ChannelGrant {
                    channel_id,
                    channel_name: Some(m.tier.name.clone()),
                    expires_at: None,
                })
            }),
            error_message: tier.as_ref().err().map(ToString::to_string),
        };

        let store = &self.store;
        let completion = &completion;
        let recorded = with_retry("complete_payment", reference, move || {
            store.complete_payment(completion)
        })
        .await;
        match recorded {
            Ok(true) => {}
            Ok(false) => {
                warn!(reference, "verified payment was no longer pending");
                self.notify_operator(
                    reference,
                    messages::operator_unrecorded(payment, "payment was no longer pending"),
                )
                .await;
                return;
            }
            Err(e) => {
                error!(reference, error = %e, "failed to record completed payment");
                self.notify_user(
                    reference,
                    context,
                    NotificationKind::Success,
                    messages::VERIFIED_WITH_ERROR.to_string(),
                    &[],
                )
                .await;
                self.notify_operator(reference, messages::operator_unrecorded(payment, &e.to_string()))
                    .await;
                return;
            }
        }

        let Ok(tier) = tier else {
            error!(reference, amount = payment.amount, "no reward tier matches verified payment");
            self.notify_user(
                reference,
                context,
                NotificationKind::Success,
                messages::VERIFIED_WITH_ERROR.to_string(),
                &[],
            )
            .await;
            self.notify_operator(reference, messages::operator_no_tier(payment))
                .await;
            return;
        };

        info!(reference, tier = %tier.tier.name, receipt = ?receipt, "payment completed");
        let buttons: Vec<LinkButton> = tier
            .tier
            .invite_link
            .iter()
            .map(|url| LinkButton {
                text: format!("Join {}", tier.tier.name),
                url: url.clone(),
            })
            .collect();
        self.notify_user(
            reference,
            context,
            NotificationKind::Success,
            messages::success(payment, receipt.as_deref(), phone.as_deref(), &tier),
            &buttons,
        )
        .await;
    }

    /// Marks a payment timed out after it expired while nothing was polling it.
    async fn expire(&self, payment: &Payment, context: &VerificationContext) {
        let reference = payment.internal_reference.as_str();
        warn!(reference, "pending payment expired before verification could resume");
        let update = terminal_update(
            PaymentStatus::TimedOut,
            "payment expired before verification could resume",
        );
        let persisted = self.transition(reference, update).await;
        if matches!(persisted, Persisted::AlreadySettled) {
            return;
        }
        self.notify_user(
            reference,
            context,
            NotificationKind::Timeout,
            messages::timeout(payment, &self.settings.support_username),
            &[],
        )
        .await;
        match persisted {
            Persisted::Applied => {
                self.notify_operator(reference, messages::operator_expired(payment))
                    .await;
            }
            other => {
                self.report_unrecorded(payment, PaymentStatus::TimedOut, other)
                    .await;
            }
        }
    }

    /// Applies a terminal status update, retrying transient store failures.
    ///
    /// The task stays registered until this returns, so a deregistered
    /// verification never leaves a row pending unless the retries ran out.
    async fn transition(&self, reference: &str, update: PaymentUpdate) -> Persisted {
        let store = &self.store;
        let update = &update;
        match with_retry("update_payment", reference, move || {
            store.update_payment(reference, update)
        })
        .await
        {
            Ok(true) => {
                info!(reference, status = ?update.status, "payment status updated");
                Persisted::Applied
            }
            Ok(false) => {
                warn!(reference, status = ?update.status, "payment no longer pending, update skipped");
                Persisted::AlreadySettled
            }
            Err(e) => {
                error!(reference, error = %e, "failed to persist terminal payment status");
                Persisted::Unrecorded(e)
            }
        }
    }

    /// Alerts the operator when a terminal status could not be stored.
    async fn report_unrecorded(&self, payment: &Payment, status: PaymentStatus, persisted: Persisted) {
        if let Persisted::Unrecorded(e) = persisted {
            self.notify_operator(
                &payment.internal_reference,
                messages::operator_status_unrecorded(payment, status, &e.to_string()),
            )
            .await;
        }
    }

    async fn record_attempt(
        &self,
        reference: &str,
        attempt_number: u32,
        result: &Result<GatewayReply, HarambeeError>,
    ) {
        let attempt = match result {
            Ok(reply) => VerificationAttempt {
                payment_ref: reference.to_string(),
                attempt_number,
                status_code: Some(reply.http_status),
                response_text: Some(reply.raw.clone()),
                was_successful: matches!(reply.status, GatewayStatus::Completed { .. }),
                timestamp: None,
            },
            Err(e) => VerificationAttempt {
                payment_ref: reference.to_string(),
                attempt_number,
                status_code: None,
                response_text: Some(e.to_string()),
                was_successful: false,
                timestamp: None,
            },
        };
        if let Err(e) = self.store.record_verification_attempt(&attempt).await {
            warn!(reference, attempt_number, error = %e, "failed to record verification attempt");
        }
    }

    async fn notify_user(
        &self,
        reference: &str,
        context: &VerificationContext,
        kind: NotificationKind,
        text: String,
        buttons: &[LinkButton],
    ) {
        let Some(chat_id) = context.chat_id else {
            debug!(reference, %kind, "no chat for payer, notification skipped");
            return;
        };
        let (message_id, status) = match self.notifier.send_to_user(chat_id, &text, buttons).await
        {
            Ok(id) => (Some(id.0), DeliveryStatus::Sent),
            Err(e) => {
                warn!(reference, %kind, error = %e, "payer notification failed");
                (None, DeliveryStatus::Failed)
            }
        };
        self.record_notification(NotificationRecord {
            payment_reference: Some(reference.to_string()),
            user_id: context.user_id,
            chat_id: Some(chat_id),
            message_id,
            kind,
            content: text,
            status,
        })
        .await;
    }

    async fn notify_operator(&self, reference: &str, text: String) {
        let (message_id, status) = match self.notifier.send_to_operator(&text).await {
            Ok(id) => (Some(id.0), DeliveryStatus::Sent),
            Err(e) => {
                warn!(reference, error = %e, "operator alert failed");
                (None, DeliveryStatus::Failed)
            }
        };
        self.record_notification(NotificationRecord {
            payment_reference: Some(reference.to_string()),
            user_id: None,
            chat_id: None,
            message_id,
            kind: NotificationKind::OperatorAlert,
            content: text,
            status,
        })
        .await;
    }

    async fn record_notification(&self, record: NotificationRecord) {
        if let Err(e) = self.store.record_notification(&record).await {
            warn!(kind = %record.kind, error = %e, "failed to record notification");
        }
    }

    /// Rebuilds the payer context of a payment found pending at start-up.
    ///
    /// Prefers the chat of the phone mapping made at initiation; private
    /// chats share the payer's user id otherwise.
    async fn recover_context(&self, payment: &Payment) -> VerificationContext {
        let mapped = match self.store.get_phone_mapping(&payment.phone).await {
            Ok(mapping) => mapping.filter(|m| payment.user_id.is_none() || m.user_id == payment.user_id),
            Err(e) => {
                warn!(reference = %payment.internal_reference, error = %e, "phone mapping lookup failed");
                None
            }
        };
        VerificationContext {
            chat_id: mapped.map(|m| m.chat_id).or(payment.user_id),
            user_id: payment.user_id,
        }
    }
}
