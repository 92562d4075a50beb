//! Telegram webhook payload types.
//!
//! Only the fields the pipeline consumes are modeled; everything else in the
//! Bot API `Update` object is ignored by serde.

use serde::Deserialize;

use proptalk_common::{InboundUpdate, Platform, now_epoch};

/// Header Telegram echoes back with every webhook call when a secret token
/// was registered via `setWebhook`.
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Normalize into the pipeline's inbound shape.
    ///
    /// Returns `None` for updates the pipeline should ack and discard:
    /// non-message updates, messages without a sender (channel posts), and
    /// non-text messages.
    #[must_use]
    pub fn into_inbound(self) -> Option<InboundUpdate> {
        let message = self.message?;
        let from = message.from?;
        let text = message.text?;
        Some(InboundUpdate {
            platform: Platform::Telegram,
            external_id: self.update_id.to_string(),
            sender_id: from.id.to_string(),
            chat_id: message.chat.id.to_string(),
            text,
            received_at: now_epoch(),
            sender_name: Some(from.username.unwrap_or(from.first_name)),
        })
    }
}
