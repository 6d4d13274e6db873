// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound notification trait (payer chats and the operator channel).

use async_trait::async_trait;

use crate::error::HarambeeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{LinkButton, MessageId};

/// Delivers text to payers and to the operator channel.
///
/// Callers inside the verification engine log failures and move on; an
/// undelivered message never changes a payment's outcome.
#[async_trait]
pub trait NotificationSink: PluginAdapter {
    /// Sends `text` to a payer's chat, optionally with URL buttons.
    async fn send_to_user(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[LinkButton],
    ) -> Result<MessageId, HarambeeError>;

    /// Sends `text` to the operator channel.
    async fn send_to_operator(&self, text: &str) -> Result<MessageId, HarambeeError>;
}
