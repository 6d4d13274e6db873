// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notification sink for deterministic testing.
//!
//! `MockNotifier` implements `NotificationSink` by capturing every message
//! for assertion in tests. Sends can be made to fail to exercise the
//! fire-and-log path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use harambee_core::HarambeeError;
use harambee_core::traits::adapter::PluginAdapter;
use harambee_core::traits::notifier::NotificationSink;
use harambee_core::types::{AdapterType, HealthStatus, LinkButton, MessageId};

/// A captured outbound message. `chat_id` is `None` for operator alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: Option<i64>,
    pub text: String,
    pub buttons: Vec<LinkButton>,
}

pub struct MockNotifier {
    user_messages: Arc<Mutex<Vec<SentMessage>>>,
    operator_messages: Arc<Mutex<Vec<SentMessage>>>,
    next_id: AtomicI64,
    fail_sends: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            user_messages: Arc::new(Mutex::new(Vec::new())),
            operator_messages: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicI64::new(1),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Make every subsequent send fail without capturing it.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub async fn user_messages(&self) -> Vec<SentMessage> {
        self.user_messages.lock().await.clone()
    }

    pub async fn operator_messages(&self) -> Vec<SentMessage> {
        self.operator_messages.lock().await.clone()
    }

    /// Payer messages whose text contains `needle`.
    pub async fn user_messages_containing(&self, needle: &str) -> Vec<SentMessage> {
        self.user_messages
            .lock()
            .await
            .iter()
            .filter(|m| m.text.contains(needle))
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.user_messages.lock().await.clear();
        self.operator_messages.lock().await.clear();
    }

    fn deliver(&self) -> Result<MessageId, HarambeeError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(HarambeeError::Channel {
                message: "mock delivery failure".into(),
                source: None,
            });
        }
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockNotifier {
    fn name(&self) -> &str {
        "mock-notifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, HarambeeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HarambeeError> {
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for MockNotifier {
    async fn send_to_user(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[LinkButton],
    ) -> Result<MessageId, HarambeeError> {
        let id = self.deliver()?;
        self.user_messages.lock().await.push(SentMessage {
            chat_id: Some(chat_id),
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(id)
    }

    async fn send_to_operator(&self, text: &str) -> Result<MessageId, HarambeeError> {
        let id = self.deliver()?;
        self.operator_messages.lock().await.push(SentMessage {
            chat_id: None,
            text: text.to_string(),
            buttons: Vec::new(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_user_and_operator_messages_separately() {
        let notifier = MockNotifier::new();
        let first = notifier.send_to_user(7, "hello", &[]).await.unwrap();
        let second = notifier.send_to_operator("alert").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(notifier.user_messages().await.len(), 1);
        assert_eq!(notifier.operator_messages().await[0].text, "alert");
    }

    #[tokio::test]
    async fn failing_sends_are_not_captured() {
        let notifier = MockNotifier::new();
        notifier.fail_sends(true);
        assert!(notifier.send_to_user(7, "hello", &[]).await.is_err());
        assert!(notifier.user_messages().await.is_empty());
    }
}
