//! Telegram Bot API channel: webhook payload types and the outbound sender.

pub mod outbound;
pub mod webhook;

pub use {
    outbound::TelegramSender,
    webhook::{SECRET_HEADER, Update},
};
