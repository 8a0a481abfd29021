//! Notifier implementations — how run summaries and scheduled messages
//! actually reach the owner.
//!
//! The owner id doubles as the delivery address: for Telegram it is the
//! chat id, for webhooks it travels in the payload.

use async_trait::async_trait;
use weft_core::config::{NotifyConfig, TelegramNotifyConfig, WebhookNotifyConfig};
use weft_core::error::{Result, WeftError};
use weft_core::traits::Notifier;

/// Telegram Bot API notifier, via `sendMessage`.
pub struct TelegramNotifier {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramNotifyConfig) -> Self {
        Self {
            bot_token: config.bot_token.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, owner_id: &str, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let chat_id = owner_id.strip_prefix("tg:").unwrap_or(owner_id);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| WeftError::Notify(format!("Telegram send failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(WeftError::Notify(format!("Telegram API error {status}: {body}")))
        }
    }
}

/// Generic HTTP webhook notifier — POST with a JSON body.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookNotifyConfig) -> Self {
        Self {
            url: config.url.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, owner_id: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "owner_id": owner_id,
                "text": text,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| WeftError::Notify(format!("Webhook send failed: {e}")))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(WeftError::Notify(format!(
                "Webhook error {}",
                response.status()
            )))
        }
    }
}

/// Tracing-only notifier for development and dry runs.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, owner_id: &str, text: &str) -> Result<()> {
        tracing::info!("📣 [{owner_id}] {text}");
        Ok(())
    }
}

/// Pick the notifier for a config: Telegram when enabled, else webhook,
/// else log-only.
pub fn notifier_from_config(config: &NotifyConfig) -> std::sync::Arc<dyn Notifier> {
    if let Some(tg) = &config.telegram
        && tg.enabled
        && !tg.bot_token.is_empty()
    {
        return std::sync::Arc::new(TelegramNotifier::new(tg));
    }
    if let Some(wh) = &config.webhook
        && wh.enabled
        && !wh.url.is_empty()
    {
        return std::sync::Arc::new(WebhookNotifier::new(wh));
    }
    std::sync::Arc::new(LogNotifier)
}

/// Escape Telegram MarkdownV1 special characters in user-supplied text.
pub fn escape_markdown(s: &str) -> String {
    s.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('`', "\\`")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b*c[d`e"), "a\\_b\\*c\\[d\\`e");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        assert!(LogNotifier.notify("tg:1", "hello").await.is_ok());
    }

    #[test]
    fn test_notifier_selection_falls_back_to_log() {
        let config = NotifyConfig::default();
        // No channels configured: selection still yields a working notifier.
        let _notifier = notifier_from_config(&config);
    }
}
