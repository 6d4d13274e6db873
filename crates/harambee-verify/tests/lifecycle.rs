// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure, recovery and shutdown paths of the verification engine.

use std::time::Duration;

use harambee_core::types::{GatewayStatus, NotificationKind, PaymentStatus};
use harambee_core::{HarambeeError, StorageAdapter};
use harambee_test_utils::TestHarness;
use harambee_verify::messages;

#[tokio::test(start_paused = true)]
async fn gateway_failure_is_persisted_with_reason() {
    let h = TestHarness::new().await.unwrap();
    h.seed_payment("DON-10-F", 10, 200).await.unwrap();
    h.gateway
        .push_status(GatewayStatus::Failed {
            reason: "Insufficient funds".into(),
        })
        .await;

    h.engine
        .start("DON-10-F", TestHarness::context(10))
        .await
        .unwrap();
    h.engine.wait("DON-10-F").await;

    let payment = h.payment("DON-10-F").await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.error_message.as_deref(), Some("Insufficient funds"));

    let sent = h.notifier.user_messages_containing("Payment Failed").await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("Reason: Insufficient funds"));
    assert!(sent[0].text.contains("/donate"));
    assert!(h.notifier.operator_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn errored_polls_count_as_inconclusive_attempts() {
    let h = TestHarness::builder()
        .with_max_attempts(3)
        .build()
        .await
        .unwrap();
    h.seed_payment("DON-11-G", 11, 200).await.unwrap();
    for _ in 0..3 {
        h.gateway.push_error("connection reset").await;
    }

    h.engine
        .start("DON-11-G", TestHarness::context(11))
        .await
        .unwrap();
    h.engine.wait("DON-11-G").await;

    assert_eq!(
        h.payment("DON-11-G").await.unwrap().status,
        PaymentStatus::TimedOut
    );
    let attempts = h.storage.list_verification_attempts("DON-11-G").await.unwrap();
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a.status_code.is_none() && !a.was_successful));
    assert_eq!(
        attempts.iter().map(|a| a.attempt_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test(start_paused = true)]
async fn transient_error_then_completion_still_completes() {
    let h = TestHarness::new().await.unwrap();
    h.seed_payment("DON-12-H", 12, 60_000).await.unwrap();
    h.gateway.push_error("HTTP 503").await;
    h.gateway
        .push_status(GatewayStatus::Completed {
            receipt: Some("K1".into()),
            phone: None,
        })
        .await;

    h.engine
        .start("DON-12-H", TestHarness::context(12))
        .await
        .unwrap();
    h.engine.wait("DON-12-H").await;

    assert_eq!(
        h.payment("DON-12-H").await.unwrap().status,
        PaymentStatus::Completed
    );
    let success = h.notifier.user_messages_containing("Kings").await;
    assert_eq!(success.len(), 1);
    assert!(!success[0].text.contains("more to unlock"));
}

#[tokio::test(start_paused = true)]
async fn completed_amount_without_tier_alerts_operator() {
    let h = TestHarness::new().await.unwrap();
    h.seed_payment("DON-13-I", 13, 5).await.unwrap();
    h.gateway
        .push_status(GatewayStatus::Completed {
            receipt: None,
            phone: None,
        })
        .await;

    h.engine
        .start("DON-13-I", TestHarness::context(13))
        .await
        .unwrap();
    h.engine.wait("DON-13-I").await;

    let payment = h.payment("DON-13-I").await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(
        payment
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("no reward tier"))
    );
    let sent = h.notifier.user_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, messages::VERIFIED_WITH_ERROR);
    assert_eq!(h.notifier.operator_messages().await.len(), 1);
    assert!(h.storage.list_channel_access(13).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn notification_failures_do_not_change_the_outcome() {
    let h = TestHarness::new().await.unwrap();
    h.seed_payment("DON-14-J", 14, 100).await.unwrap();
    h.notifier.fail_sends(true);
    h.gateway
        .push_status(GatewayStatus::Completed {
            receipt: None,
            phone: None,
        })
        .await;

    h.engine
        .start("DON-14-J", TestHarness::context(14))
        .await
        .unwrap();
    h.engine.wait("DON-14-J").await;

    assert_eq!(
        h.payment("DON-14-J").await.unwrap().status,
        PaymentStatus::Completed
    );
    assert_eq!(
        h.storage
            .notification_count("DON-14-J", NotificationKind::Success)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn start_rejects_unknown_and_settled_payments() {
    let h = TestHarness::new().await.unwrap();
    assert!(matches!(
        h.engine.start("NOPE", TestHarness::context(1)).await,
        Err(HarambeeError::Validation(_))
    ));

    h.seed_payment("DON-15-K", 15, 100).await.unwrap();
    assert!(h.engine.cancel("DON-15-K").await.unwrap());
    assert!(matches!(
        h.engine.start("DON-15-K", TestHarness::context(15)).await,
        Err(HarambeeError::Validation(_))
    ));
    assert_eq!(h.engine.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_without_running_verification_settles_the_row() {
    let h = TestHarness::new().await.unwrap();
    h.seed_payment("DON-16-L", 16, 100).await.unwrap();

    assert!(h.engine.cancel("DON-16-L").await.unwrap());
    let payment = h.payment("DON-16-L").await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Cancelled);

    // Already terminal: nothing changes.
    assert!(!h.engine.cancel("DON-16-L").await.unwrap());
    assert!(matches!(
        h.engine.cancel("DON-unknown").await,
        Err(HarambeeError::VerificationNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn shutdown_leaves_payments_pending_and_refuses_new_starts() {
    let h = TestHarness::new().await.unwrap();
    h.seed_payment("DON-17-M", 17, 100).await.unwrap();
    h.seed_payment("DON-18-N", 18, 100).await.unwrap();

    h.engine
        .start("DON-17-M", TestHarness::context(17))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;

    h.engine.shutdown_all().await;
    assert_eq!(h.engine.active_count(), 0);
    assert!(h.engine.is_shutting_down());
    assert!(h.gateway.was_shut_down());
    assert_eq!(
        h.payment("DON-17-M").await.unwrap().status,
        PaymentStatus::Pending
    );
    assert!(matches!(
        h.engine.start("DON-18-N", TestHarness::context(18)).await,
        Err(HarambeeError::ShuttingDown)
    ));
}

#[tokio::test(start_paused = true)]
async fn resume_restarts_live_payments_and_expires_stale_ones() {
    // A large budget keeps the resumed verification running for the whole test.
    let h = TestHarness::builder()
        .with_max_attempts(1000)
        .build()
        .await
        .unwrap();
    h.seed_payment_expiring("DON-19-O", 19, 100, Duration::from_secs(600))
        .await
        .unwrap();
    h.seed_payment_expiring("DON-20-P", 20, 100, Duration::ZERO)
        .await
        .unwrap();

    let report = h.engine.resume_pending().await.unwrap();
    assert_eq!(report.resumed, 1);
    assert_eq!(report.expired, 1);
    assert!(h.engine.is_active("DON-19-O"));
    let active = h.engine.active_verifications();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].reference, "DON-19-O");
    assert_eq!(active[0].context.chat_id, Some(19));

    let stale = h.payment("DON-20-P").await.unwrap();
    assert_eq!(stale.status, PaymentStatus::TimedOut);
    let alerts = h.notifier.operator_messages().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].text.contains("DON-20-P"));
    let timeouts = h.notifier.user_messages_containing("Timeout").await;
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].chat_id, Some(20));

    // Resuming again does not register a second task.
    let again = h.engine.resume_pending().await.unwrap();
    assert_eq!(again.resumed, 0);
    assert_eq!(again.skipped, 1);
    assert_eq!(h.engine.active_count(), 1);

    h.engine.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn terminal_write_is_retried_through_a_store_outage() {
    let h = TestHarness::builder()
        .with_pool_size(1)
        .build()
        .await
        .unwrap();
    h.seed_payment("DON-21-Q", 21, 100).await.unwrap();
    h.gateway
        .push_status(GatewayStatus::Failed {
            reason: "Declined".into(),
        })
        .await;

    h.engine
        .start("DON-21-Q", TestHarness::context(21))
        .await
        .unwrap();
    let held = h.storage.database().unwrap().pool().acquire().unwrap();

    // The poll at 15s settles, but every write fails until the connection is back.
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(h.engine.is_active("DON-21-Q"));
    drop(held);
    h.engine.wait("DON-21-Q").await;

    assert!(!h.engine.is_active("DON-21-Q"));
    assert_eq!(
        h.payment("DON-21-Q").await.unwrap().status,
        PaymentStatus::Failed
    );
    assert_eq!(h.notifier.user_messages_containing("Payment Failed").await.len(), 1);
    assert!(h.notifier.operator_messages().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unrecordable_terminal_status_alerts_operator() {
    let h = TestHarness::builder()
        .with_pool_size(1)
        .build()
        .await
        .unwrap();
    h.seed_payment("DON-22-R", 22, 100).await.unwrap();
    h.gateway
        .push_status(GatewayStatus::Failed {
            reason: "Declined".into(),
        })
        .await;

    h.engine
        .start("DON-22-R", TestHarness::context(22))
        .await
        .unwrap();
    let held = h.storage.database().unwrap().pool().acquire().unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!h.engine.is_active("DON-22-R"));
    drop(held);

    assert_eq!(
        h.payment("DON-22-R").await.unwrap().status,
        PaymentStatus::Pending
    );
    let alerts = h.notifier.operator_messages().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].text.contains("DON-22-R"));
    assert!(alerts[0].text.contains("could not be recorded"));
}

#[tokio::test(start_paused = true)]
async fn cancel_reports_false_when_verification_completed_first() {
    let h = TestHarness::builder()
        .with_pool_size(1)
        .build()
        .await
        .unwrap();
    h.seed_payment("DON-23-S", 23, 100).await.unwrap();
    h.gateway
        .push_status(GatewayStatus::Completed {
            receipt: Some("K23".into()),
            phone: None,
        })
        .await;

    h.engine
        .start("DON-23-S", TestHarness::context(23))
        .await
        .unwrap();
    // Completion is seen at 15s; its write is still backing off at 16s.
    let held = h.storage.database().unwrap().pool().acquire().unwrap();
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(h.engine.is_active("DON-23-S"));
    drop(held);

    assert!(!h.engine.cancel("DON-23-S").await.unwrap());
    assert_eq!(
        h.payment("DON-23-S").await.unwrap().status,
        PaymentStatus::Completed
    );
    assert!(!h.engine.is_active("DON-23-S"));
}
