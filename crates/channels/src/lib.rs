//! Channel seam traits.
//!
//! Each platform adapter (Telegram, WhatsApp) implements [`ChannelOutbound`];
//! the storage crate implements the record-store traits. Everything the
//! pipeline touches beyond its own state goes through one of these seams so
//! collaborators can be substituted in tests.

pub mod error;
pub mod log;
pub mod outbound;
pub mod store;

pub use {
    error::SendError,
    log::{ConversationEntry, ConversationLog},
    outbound::{ChannelOutbound, TextFormat},
    store::{
        Agent, AgentDirectory, ForwardLog, ForwardRequest, ForwardStatus, PlatformUser,
        UpdateDedup, UserStore,
    },
};
