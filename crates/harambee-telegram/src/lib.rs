// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram delivery for the Harambee donation bot.
//!
//! Implements [`NotificationSink`] over the Telegram Bot API via teloxide.
//! Payer messages go to the payer's chat, operator alerts to
//! `telegram.admin_chat_id`. URL buttons render as an inline keyboard.

use std::time::Duration;

use async_trait::async_trait;
use harambee_config::model::TelegramConfig;
use harambee_core::error::HarambeeError;
use harambee_core::traits::{NotificationSink, PluginAdapter};
use harambee_core::types::{AdapterType, HealthStatus, LinkButton, MessageId};
use teloxide::RequestError;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{debug, warn};

/// Pause between attempts when Telegram gives no retry hint.
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Telegram notification sink implementing [`NotificationSink`].
pub struct TelegramNotifier {
    bot: Bot,
    admin_chat: Option<ChatId>,
    attempts: u32,
}

impl TelegramNotifier {
    /// Creates a notifier. Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, HarambeeError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            HarambeeError::Config("telegram.bot_token is required for Telegram delivery".into())
        })?;
        if token.is_empty() {
            return Err(HarambeeError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }
        Ok(Self {
            bot: Bot::new(token),
            admin_chat: config.admin_chat_id.map(ChatId),
            attempts: config.send_retries.max(1),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    async fn send(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageId, HarambeeError> {
        let mut attempt = 1;
        loop {
            let mut request = self.bot.send_message(chat_id, text);
            if let Some(keyboard) = keyboard.clone() {
                request = request.reply_markup(keyboard);
            }
            match request.await {
                Ok(sent) => return Ok(MessageId(i64::from(sent.id.0))),
                Err(e) if attempt < self.attempts => {
                    let delay = retry_delay(&e);
                    warn!(
                        chat_id = chat_id.0,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "telegram send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(HarambeeError::Channel {
                        message: format!("failed to send message after {attempt} attempts: {e}"),
                        source: Some(Box::new(e)),
                    });
                }
            }
        }
    }
}

/// How long to wait before retrying after `error`.
fn retry_delay(error: &RequestError) -> Duration {
    match error {
        RequestError::RetryAfter(after) => Duration::from_secs(u64::from(after.seconds())),
        _ => DEFAULT_BACKOFF,
    }
}

/// Builds a one-button-per-row keyboard. Buttons with unparsable URLs are dropped.
fn keyboard(buttons: &[LinkButton]) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = buttons
        .iter()
        .filter_map(|button| match reqwest::Url::parse(&button.url) {
            Ok(url) => Some(vec![InlineKeyboardButton::url(button.text.clone(), url)]),
            Err(e) => {
                warn!(url = %button.url, error = %e, "dropping button with invalid URL");
                None
            }
        })
        .collect();
    (!rows.is_empty()).then(|| InlineKeyboardMarkup::new(rows))
}

#[async_trait]
impl PluginAdapter for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, HarambeeError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), HarambeeError> {
        debug!("Telegram notifier shutting down");
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send_to_user(
        &self,
        chat_id: i64,
        text: &str,
        buttons: &[LinkButton],
    ) -> Result<MessageId, HarambeeError> {
        self.send(ChatId(chat_id), text, keyboard(buttons)).await
    }

    async fn send_to_operator(&self, text: &str) -> Result<MessageId, HarambeeError> {
        let chat = self.admin_chat.ok_or_else(|| HarambeeError::Channel {
            message: "no operator chat configured (telegram.admin_chat_id)".into(),
            source: None,
        })?;
        self.send(chat, text, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::Seconds;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(str::to_string),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(TelegramNotifier::new(&config(None)).is_err());
        assert!(TelegramNotifier::new(&config(Some(""))).is_err());
        assert!(TelegramNotifier::new(&config(Some("123456:ABC-DEF1234ghIkl"))).is_ok());
    }

    #[test]
    fn zero_retries_still_sends_once() {
        let mut cfg = config(Some("test:token"));
        cfg.send_retries = 0;
        assert_eq!(TelegramNotifier::new(&cfg).unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn operator_alert_without_admin_chat_fails_fast() {
        let notifier = TelegramNotifier::new(&config(Some("test:token"))).unwrap();
        assert!(matches!(
            notifier.send_to_operator("alert").await,
            Err(HarambeeError::Channel { .. })
        ));
    }

    #[test]
    fn retry_after_hint_is_honoured() {
        let err = RequestError::RetryAfter(Seconds::from_seconds(7));
        assert_eq!(retry_delay(&err), Duration::from_secs(7));
        let err = RequestError::MigrateToChatId(ChatId(-100));
        assert_eq!(retry_delay(&err), DEFAULT_BACKOFF);
    }

    #[test]
    fn keyboard_drops_invalid_urls() {
        let buttons = [
            LinkButton {
                text: "Join Helpers".into(),
                url: "https://t.me/+helpers".into(),
            },
            LinkButton {
                text: "Broken".into(),
                url: "not a url".into(),
            },
        ];
        let markup = keyboard(&buttons).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 1);
        assert_eq!(markup.inline_keyboard[0][0].text, "Join Helpers");
        assert!(keyboard(&[]).is_none());
    }
}
