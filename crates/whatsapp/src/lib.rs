//! WhatsApp channel over the Twilio messaging API: form-encoded webhook
//! parsing (including delivery-status callbacks) and the outbound sender.

pub mod outbound;
pub mod webhook;

pub use {
    outbound::WhatsAppSender,
    webhook::{EMPTY_TWIML, InboundForm, WebhookKind},
};
