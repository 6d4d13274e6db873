// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory registry of running verifications.
//!
//! At most one entry exists per reference. Entries are inserted by
//! `start` and removed only by the task they describe, after the payment
//! row already holds its final status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Who the payer is and where to talk to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationContext {
    /// Chat that receives payer notifications. `None` silences them.
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// Why a verification task was told to stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The payer cancelled; the payment is marked cancelled.
    UserCancel,
    /// The process is going down; the payment stays pending for recovery.
    Shutdown,
}

/// Cooperative stop request shared between the registry and one task.
///
/// The first reason set wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct StopSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl StopSignal {
    pub(crate) fn stop(&self, reason: StopReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Resolves once a stop was requested, yielding its reason.
    pub(crate) async fn stopped(&self) -> StopReason {
        self.token.cancelled().await;
        self.reason()
    }

    fn reason(&self) -> StopReason {
        self.reason.get().copied().unwrap_or(StopReason::Shutdown)
    }
}

struct ActiveVerification {
    started_at: Instant,
    context: VerificationContext,
    stop: StopSignal,
    done: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// A stop request that has been delivered to a task.
pub(crate) struct Stopping {
    pub(crate) handle: Option<JoinHandle<()>>,
    pub(crate) done: CancellationToken,
}

impl Stopping {
    /// Waits until the task has finished and deregistered.
    pub(crate) async fn finished(self) {
        if let Some(handle) = self.handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "verification task ended abnormally");
        }
        self.done.cancelled().await;
    }
}

/// Summary of one running verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSummary {
    pub reference: String,
    pub context: VerificationContext,
    pub running_for: Duration,
}

/// Outcome of [`Registry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    Registered,
    Duplicate,
    Closed,
}

#[derive(Default)]
pub(crate) struct Registry {
    active: Mutex<HashMap<String, ActiveVerification>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveVerification>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers `reference` and spawns its task under the registry lock.
    ///
    /// `spawn` is only called when no entry exists and `admit` returns
    /// true; it receives the task's stop signal and completion token.
    pub(crate) fn register(
        &self,
        reference: &str,
        context: VerificationContext,
        admit: impl FnOnce() -> bool,
        spawn: impl FnOnce(StopSignal, CancellationToken) -> JoinHandle<()>,
    ) -> Registration {
        let mut active = self.lock();
        if !admit() {
            return Registration::Closed;
        }
        if active.contains_key(reference) {
            return Registration::Duplicate;
        }
        let stop = StopSignal::default();
        let done = CancellationToken::new();
        let handle = spawn(stop.clone(), done.clone());
        active.insert(
            reference.to_string(),
            ActiveVerification {
                started_at: Instant::now(),
                context,
                stop,
                done,
                handle: Some(handle),
            },
        );
        Registration::Registered
    }

    /// Removes the entry for `reference`; called by the task as its last step.
    pub(crate) fn deregister(&self, reference: &str) {
        if let Some(entry) = self.lock().remove(reference) {
            entry.done.cancel();
        }
    }

    /// Asks the task for `reference` to stop. `None` if nothing is registered.
    pub(crate) fn stop(&self, reference: &str, reason: StopReason) -> Option<Stopping> {
        let mut active = self.lock();
        let entry = active.get_mut(reference)?;
        entry.stop.stop(reason);
        Some(Stopping {
            handle: entry.handle.take(),
            done: entry.done.clone(),
        })
    }

    pub(crate) fn stop_all(&self, reason: StopReason) -> Vec<Stopping> {
        self.lock()
            .values_mut()
            .map(|entry| {
                entry.stop.stop(reason);
                Stopping {
                    handle: entry.handle.take(),
                    done: entry.done.clone(),
                }
            })
            .collect()
    }

    /// Completion token of a running verification.
    pub(crate) fn done_token(&self, reference: &str) -> Option<CancellationToken> {
        self.lock().get(reference).map(|entry| entry.done.clone())
    }

    pub(crate) fn contains(&self, reference: &str) -> bool {
        self.lock().contains_key(reference)
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<ActiveSummary> {
        let mut summaries: Vec<_> = self
            .lock()
            .iter()
            .map(|(reference, entry)| ActiveSummary {
                reference: reference.clone(),
                context: entry.context.clone(),
                running_for: entry.started_at.elapsed(),
            })
            .collect();
        summaries.sort_by(|a, b| a.reference.cmp(&b.reference));
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> VerificationContext {
        VerificationContext {
            chat_id: Some(1),
            user_id: Some(1),
        }
    }

    #[tokio::test]
    async fn second_registration_is_rejected_without_spawning() {
        let registry = Registry::default();
        assert_eq!(
            registry.register("R1", ctx(), || true, |_, _| tokio::spawn(async {})),
            Registration::Registered
        );
        let mut spawned = false;
        let second = registry.register(
            "R1",
            ctx(),
            || true,
            |_, _| {
                spawned = true;
                tokio::spawn(async {})
            },
        );
        assert_eq!(second, Registration::Duplicate);
        assert!(!spawned);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn closed_registry_admits_nothing() {
        let registry = Registry::default();
        assert_eq!(
            registry.register("R1", ctx(), || false, |_, _| tokio::spawn(async {})),
            Registration::Closed
        );
        assert!(!registry.contains("R1"));
    }

    #[tokio::test]
    async fn stop_delivers_reason_and_waits_for_deregistration() {
        let registry = Arc::new(Registry::default());
        let inner = Arc::clone(&registry);
        registry
            .register("R1", ctx(), || true, move |stop, _done| {
                tokio::spawn(async move {
                    let reason = stop.stopped().await;
                    assert_eq!(reason, StopReason::UserCancel);
                    inner.deregister("R1");
                })
            });

        let stopping = registry.stop("R1", StopReason::UserCancel).unwrap();
        stopping.finished().await;
        assert!(!registry.contains("R1"));
        assert!(registry.stop("R1", StopReason::Shutdown).is_none());
    }

    #[test]
    fn first_stop_reason_wins() {
        let signal = StopSignal::default();
        signal.stop(StopReason::UserCancel);
        signal.stop(StopReason::Shutdown);
        assert_eq!(signal.reason(), StopReason::UserCancel);
    }
}
