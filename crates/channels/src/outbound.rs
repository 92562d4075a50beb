use async_trait::async_trait;

use crate::error::SendError;

/// Formatting hint for outbound text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
    #[default]
    Plain,
    /// Markdown-like mode where the platform supports one.
    Markdown,
}

/// Send a message to one platform.
///
/// Implementations perform exactly one attempt per call and classify the
/// failure; retry policy lives in the delivery layer.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Send `text` to the platform destination `to` (chat id or phone
    /// number, platform-dependent). Returns the provider-assigned message id.
    async fn send_text(
        &self,
        to: &str,
        text: &str,
        format: TextFormat,
    ) -> Result<String, SendError>;
}
