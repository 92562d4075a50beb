//! Outbound Telegram sends over the Bot API.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use proptalk_channels::{ChannelOutbound, SendError, TextFormat};

/// Bot API response envelope for `sendMessage`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// One-attempt-per-call Telegram sender. Retry policy lives in the delivery
/// layer.
pub struct TelegramSender {
    bot_token: Secret<String>,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramSender {
    pub fn new(
        bot_token: Secret<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            bot_token,
            api_base: api_base.into(),
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

/// Map a Bot API failure status to the delivery classification.
fn classify(status: reqwest::StatusCode, description: &str) -> SendError {
    match status.as_u16() {
        400 | 404 => SendError::invalid_destination(description),
        401 => SendError::unauthorized(description),
        403 => SendError::permission_denied(description),
        _ => SendError::transient(description),
    }
}

#[async_trait]
impl ChannelOutbound for TelegramSender {
    async fn send_text(
        &self,
        to: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<String, SendError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.bot_token.expose_secret()
        );
        let mut body = serde_json::json!({ "chat_id": to, "text": text });
        if format == TextFormat::Markdown {
            body["parse_mode"] = "Markdown".into();
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::transient(format!("telegram request failed: {e}")))?;

        let status = response.status();
        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| SendError::transient(format!("telegram response unreadable: {e}")))?;

        if !status.is_success() || !parsed.ok {
            let description = parsed
                .description
                .unwrap_or_else(|| format!("telegram returned {status}"));
            return Err(classify(status, &description));
        }

        let message_id = parsed
            .result
            .map(|m| m.message_id.to_string())
            .ok_or_else(|| SendError::transient("telegram ok response missing result"))?;
        debug!(message_id, "telegram message sent");
        Ok(message_id)
    }
}
