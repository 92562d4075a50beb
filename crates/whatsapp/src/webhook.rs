//! Twilio WhatsApp webhook payloads.
//!
//! Twilio pushes both inbound messages and asynchronous delivery-status
//! updates to the same URL as form-encoded fields; a status-only callback is
//! told apart by having a message sid and status but no body, and is routed
//! to the lightweight status path instead of the pipeline.

use serde::Deserialize;

use proptalk_common::{InboundUpdate, Platform, now_epoch};

/// Empty TwiML envelope: "received, no immediate reply instructions".
pub const EMPTY_TWIML: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>";

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// The form fields this service consumes from a Twilio webhook push.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundForm {
    pub from: Option<String>,
    pub body: Option<String>,
    pub message_sid: Option<String>,
    pub message_status: Option<String>,
    pub profile_name: Option<String>,
}

/// What a webhook push turned out to be.
#[derive(Debug, PartialEq, Eq)]
pub enum WebhookKind {
    /// A real inbound message for the pipeline.
    Message(InboundUpdate),
    /// A delivery-status callback for a previously sent message.
    Status { message_sid: String, status: String },
    /// Nothing actionable (no sender, no sid); ack and drop.
    Discard,
}

impl InboundForm {
    /// Sort the push into message / status / discard.
    #[must_use]
    pub fn classify(self) -> WebhookKind {
        let body = self.body.as_deref().unwrap_or("").trim().to_string();

        if body.is_empty()
            && let (Some(sid), Some(status)) = (&self.message_sid, &self.message_status)
        {
            return WebhookKind::Status {
                message_sid: sid.clone(),
                status: status.clone(),
            };
        }

        let (Some(sid), Some(from)) = (self.message_sid, self.from) else {
            return WebhookKind::Discard;
        };
        let phone = from
            .strip_prefix(WHATSAPP_PREFIX)
            .unwrap_or(from.as_str())
            .to_string();
        if phone.is_empty() || body.is_empty() {
            return WebhookKind::Discard;
        }

        WebhookKind::Message(InboundUpdate {
            platform: Platform::Whatsapp,
            external_id: sid,
            sender_id: phone.clone(),
            chat_id: phone,
            text: body,
            received_at: now_epoch(),
            sender_name: self.profile_name,
        })
    }
}
