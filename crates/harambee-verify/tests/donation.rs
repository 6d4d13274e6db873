// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Donation initiation through the mock gateway.

use std::time::Duration;

use harambee_core::types::{GatewayStatus, PaymentStatus};
use harambee_core::{HarambeeError, StorageAdapter};
use harambee_test_utils::TestHarness;
use harambee_verify::{DonationRequest, messages};

fn request(amount: i64, phone: &str) -> DonationRequest {
    DonationRequest {
        user_id: 77,
        chat_id: 7700,
        message_id: Some(5),
        phone: phone.to_string(),
        amount,
        username: Some("jdoe".into()),
        first_name: Some("Jane".into()),
        last_name: Some("Doe".into()),
    }
}

#[tokio::test(start_paused = true)]
async fn initiate_records_payment_and_verifies_it() {
    let h = TestHarness::new().await.unwrap();
    h.gateway
        .push_status(GatewayStatus::Completed {
            receipt: Some("R77".into()),
            phone: None,
        })
        .await;

    let receipt = h.donations.initiate(&request(1000, "0712345678")).await.unwrap();
    assert!(receipt.reference.starts_with("DON-77-"));
    assert_eq!(receipt.gateway_reference, "GW-1");

    let initiated = h.gateway.initiated().await;
    assert_eq!(initiated.len(), 1);
    assert_eq!(initiated[0].phone, "254712345678");
    assert_eq!(initiated[0].customer_name.as_deref(), Some("Jane Doe"));
    assert_eq!(initiated[0].external_reference, receipt.reference);

    h.engine.wait(&receipt.reference).await;

    let payment = h.payment(&receipt.reference).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.amount, 1000);
    assert_eq!(payment.phone, "0712345678");
    assert_eq!(payment.user_id, Some(77));
    assert_eq!(payment.expiry_time.as_deref(), Some(receipt.expires_at.as_str()));

    let user = h.storage.get_user(77).await.unwrap().unwrap();
    assert_eq!(user.phone.as_deref(), Some("0712345678"));
    assert_eq!(user.first_name.as_deref(), Some("Jane"));

    let mapping = h.storage.get_phone_mapping("0712345678").await.unwrap().unwrap();
    assert_eq!(mapping.chat_id, 7700);
    assert_eq!(mapping.message_id, 5);

    let sent = h.notifier.user_messages_containing("Knights").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, Some(7700));
}

#[tokio::test(start_paused = true)]
async fn invalid_input_never_reaches_the_gateway() {
    let h = TestHarness::new().await.unwrap();

    for bad in [request(5, "0712345678"), request(200_000, "0712345678")] {
        let err = h.donations.initiate(&bad).await.unwrap_err();
        assert!(
            matches!(&err, HarambeeError::Validation(m) if m.contains("Amount must be between 10 and 150000 KES")),
            "got: {err}"
        );
    }
    for phone in ["254712345678", "071234567", "+254712345678"] {
        assert!(matches!(
            h.donations.initiate(&request(100, phone)).await,
            Err(HarambeeError::Validation(_))
        ));
    }
    assert!(h.gateway.initiated().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn gateway_failure_reports_service_unavailable_and_stores_nothing() {
    let h = TestHarness::new().await.unwrap();
    h.gateway.fail_initiation(true);

    let err = h
        .donations
        .initiate(&request(100, "0712345678"))
        .await
        .unwrap_err();
    match err {
        HarambeeError::Gateway { message, .. } => {
            assert_eq!(message, messages::SERVICE_UNAVAILABLE)
        }
        other => panic!("expected gateway error, got {other}"),
    }
    assert_eq!(h.gateway.initiated().await.len(), 1);
    assert!(
        h.storage
            .list_payments_by_status(PaymentStatus::Pending)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(h.engine.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn accepted_payment_that_cannot_be_saved_alerts_operator() {
    let h = TestHarness::builder()
        .with_pool_size(1)
        .build()
        .await
        .unwrap();
    h.gateway.set_initiation_delay(Duration::from_secs(1)).await;

    // Takes the only connection while the gateway is still answering.
    let holder = async {
        let pool = h.storage.database().unwrap().pool();
        loop {
            if !h.gateway.initiated().await.is_empty()
                && let Ok(conn) = pool.acquire()
            {
                tokio::time::sleep(Duration::from_secs(30)).await;
                drop(conn);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    let req = request(100, "0712345678");
    let (result, ()) = tokio::join!(h.donations.initiate(&req), holder);

    assert!(matches!(result, Err(HarambeeError::PoolExhausted { .. })));
    assert_eq!(h.gateway.initiated().await.len(), 1);
    let alerts = h.notifier.operator_messages().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].text.contains("DON-77-"));
    assert!(alerts[0].text.contains("GW-1"));
    assert!(
        h.storage
            .list_payments_by_status(PaymentStatus::Pending)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(h.engine.active_count(), 0);
}
