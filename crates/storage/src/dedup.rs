use {
    async_trait::async_trait,
    proptalk_channels::UpdateDedup,
    proptalk_common::Platform,
    sqlx::SqlitePool,
};

/// Durable inbound-update deduplication.
///
/// Relies on the primary key over `(platform, external_id)`: the INSERT
/// itself is the atomic check, so concurrent deliveries of the same update
/// cannot both win.
pub struct SqliteUpdateDedup {
    pool: SqlitePool,
}

impl SqliteUpdateDedup {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS seen_updates (
                platform    TEXT    NOT NULL,
                external_id TEXT    NOT NULL,
                seen_at     INTEGER NOT NULL,
                PRIMARY KEY (platform, external_id)
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Read-only lookup, for diagnostics. The pipeline uses `record_seen`;
    /// a check-then-insert pair would race.
    pub async fn is_duplicate(&self, platform: Platform, external_id: &str) -> anyhow::Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM seen_updates WHERE platform = ? AND external_id = ?")
                .bind(platform.as_str())
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl UpdateDedup for SqliteUpdateDedup {
    async fn record_seen(&self, platform: Platform, external_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO seen_updates (platform, external_id, seen_at)
             VALUES (?, ?, ?)",
        )
        .bind(platform.as_str())
        .bind(external_id)
        .bind(proptalk_common::now_epoch())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::test_pool};

    #[tokio::test]
    async fn second_delivery_is_rejected() {
        let dedup = SqliteUpdateDedup::new(test_pool().await);
        assert!(dedup.record_seen(Platform::Telegram, "42").await.unwrap());
        assert!(!dedup.record_seen(Platform::Telegram, "42").await.unwrap());
    }

    #[tokio::test]
    async fn same_id_on_another_platform_is_distinct() {
        let dedup = SqliteUpdateDedup::new(test_pool().await);
        assert!(dedup.record_seen(Platform::Telegram, "42").await.unwrap());
        assert!(dedup.record_seen(Platform::Whatsapp, "42").await.unwrap());
    }

    #[tokio::test]
    async fn lookup_reflects_recorded_updates() {
        let dedup = SqliteUpdateDedup::new(test_pool().await);
        assert!(!dedup.is_duplicate(Platform::Telegram, "42").await.unwrap());
        dedup.record_seen(Platform::Telegram, "42").await.unwrap();
        assert!(dedup.is_duplicate(Platform::Telegram, "42").await.unwrap());
    }
}
