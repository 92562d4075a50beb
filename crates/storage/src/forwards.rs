use {
    async_trait::async_trait,
    proptalk_channels::{ForwardLog, ForwardRequest},
    sqlx::SqlitePool,
};

/// Append-only audit log of cross-platform forwards.
pub struct SqliteForwardLog {
    pool: SqlitePool,
}

impl SqliteForwardLog {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS forward_requests (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                source_platform TEXT    NOT NULL,
                source_chat_id  TEXT    NOT NULL,
                dest_platform   TEXT    NOT NULL,
                dest_phone      TEXT    NOT NULL,
                body            TEXT    NOT NULL,
                status          TEXT    NOT NULL,
                error           TEXT,
                created_at      INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    #[cfg(test)]
    async fn count(&self) -> anyhow::Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM forward_requests")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl ForwardLog for SqliteForwardLog {
    async fn record(&self, request: ForwardRequest) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO forward_requests
             (source_platform, source_chat_id, dest_platform, dest_phone,
              body, status, error, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.source_platform.as_str())
        .bind(&request.source_chat_id)
        .bind(request.dest_platform.as_str())
        .bind(&request.dest_phone)
        .bind(&request.body)
        .bind(request.status.as_str())
        .bind(&request.error)
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::test_pool,
        proptalk_channels::ForwardStatus,
        proptalk_common::{Platform, now_epoch},
    };

    #[tokio::test]
    async fn records_are_appended() {
        let log = SqliteForwardLog::new(test_pool().await);
        for status in [ForwardStatus::Sent, ForwardStatus::Failed] {
            log.record(ForwardRequest {
                source_platform: Platform::Telegram,
                source_chat_id: "c1".into(),
                dest_platform: Platform::Whatsapp,
                dest_phone: "+35799123456".into(),
                body: "viewing at 3pm".into(),
                status,
                error: matches!(status, ForwardStatus::Failed).then(|| "timeout".into()),
                created_at: now_epoch(),
            })
            .await
            .unwrap();
        }
        assert_eq!(log.count().await.unwrap(), 2);
    }
}
