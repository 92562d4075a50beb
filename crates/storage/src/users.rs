use std::str::FromStr;

use {
    async_trait::async_trait,
    proptalk_channels::{PlatformUser, UserStore},
    proptalk_common::Platform,
    sqlx::SqlitePool,
};

/// SQLite-backed registered-user store.
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS platform_users (
                platform         TEXT    NOT NULL,
                external_user_id TEXT    NOT NULL,
                agent_id         TEXT,
                display_name     TEXT,
                last_active_at   INTEGER NOT NULL,
                active           INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (platform, external_user_id)
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

type UserRow = (String, String, Option<String>, Option<String>, i64, bool);

fn from_row(r: UserRow) -> anyhow::Result<PlatformUser> {
    Ok(PlatformUser {
        platform: Platform::from_str(&r.0)?,
        external_user_id: r.1,
        agent_id: r.2,
        display_name: r.3,
        last_active_at: r.4,
        active: r.5,
    })
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get(
        &self,
        platform: Platform,
        external_user_id: &str,
    ) -> anyhow::Result<Option<PlatformUser>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT platform, external_user_id, agent_id, display_name,
                    last_active_at, active
             FROM platform_users
             WHERE platform = ? AND external_user_id = ?",
        )
        .bind(platform.as_str())
        .bind(external_user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    async fn upsert(&self, user: PlatformUser) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO platform_users
             (platform, external_user_id, agent_id, display_name, last_active_at, active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (platform, external_user_id) DO UPDATE SET
                agent_id       = excluded.agent_id,
                display_name   = excluded.display_name,
                last_active_at = excluded.last_active_at,
                active         = excluded.active",
        )
        .bind(user.platform.as_str())
        .bind(&user.external_user_id)
        .bind(&user.agent_id)
        .bind(&user.display_name)
        .bind(user.last_active_at)
        .bind(user.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_active(
        &self,
        platform: Platform,
        external_user_id: &str,
        at: i64,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE platform_users SET last_active_at = ?
             WHERE platform = ? AND external_user_id = ?",
        )
        .bind(at)
        .bind(platform.as_str())
        .bind(external_user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate(&self, platform: Platform, external_user_id: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE platform_users SET active = 0
             WHERE platform = ? AND external_user_id = ?",
        )
        .bind(platform.as_str())
        .bind(external_user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
