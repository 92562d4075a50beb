use async_trait::async_trait;

use proptalk_common::Platform;

/// One logged message, inbound or outbound.
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub id: i64,
    pub platform: Platform,
    pub chat_id: String,
    pub sender_id: String,
    /// "in" or "out".
    pub direction: String,
    pub body: String,
    pub created_at: i64,
}

/// Persistent conversation log.
///
/// Write failures are logged and swallowed by callers; logging must never
/// block a reply.
#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn log(&self, entry: ConversationEntry) -> anyhow::Result<()>;

    /// Most recent entries for one chat, newest first.
    async fn recent(
        &self,
        platform: Platform,
        chat_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<ConversationEntry>>;
}
