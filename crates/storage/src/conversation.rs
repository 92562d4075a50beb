use std::str::FromStr;

use {
    async_trait::async_trait,
    proptalk_channels::{ConversationEntry, ConversationLog},
    proptalk_common::Platform,
    sqlx::SqlitePool,
};

/// SQLite-backed conversation log.
pub struct SqliteConversationLog {
    pool: SqlitePool,
}

impl SqliteConversationLog {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversation_log (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                platform   TEXT    NOT NULL,
                chat_id    TEXT    NOT NULL,
                sender_id  TEXT    NOT NULL,
                direction  TEXT    NOT NULL,
                body       TEXT    NOT NULL,
                created_at INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversation_chat
             ON conversation_log (platform, chat_id, id DESC)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ConversationLog for SqliteConversationLog {
    async fn log(&self, entry: ConversationEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO conversation_log
             (platform, chat_id, sender_id, direction, body, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.platform.as_str())
        .bind(&entry.chat_id)
        .bind(&entry.sender_id)
        .bind(&entry.direction)
        .bind(&entry.body)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(
        &self,
        platform: Platform,
        chat_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<ConversationEntry>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, String, i64)>(
            "SELECT id, platform, chat_id, sender_id, direction, body, created_at
             FROM conversation_log
             WHERE platform = ? AND chat_id = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(platform.as_str())
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(ConversationEntry {
                    id: r.0,
                    platform: Platform::from_str(&r.1)?,
                    chat_id: r.2,
                    sender_id: r.3,
                    direction: r.4,
                    body: r.5,
                    created_at: r.6,
                })
            })
            .collect()
    }
}
