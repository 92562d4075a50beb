use {
    async_trait::async_trait,
    proptalk_channels::{Agent, AgentDirectory},
    sqlx::SqlitePool,
};

/// SQLite-backed agent directory. Rows are provisioned out of band (an
/// import job or admin tooling); this service only reads them.
pub struct SqliteAgentDirectory {
    pool: SqlitePool,
}

impl SqliteAgentDirectory {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agents (
                id     TEXT PRIMARY KEY,
                name   TEXT NOT NULL,
                email  TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_email
             ON agents (email COLLATE NOCASE)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert or replace one agent row. Used by provisioning and tests.
    pub async fn upsert(&self, agent: &Agent) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO agents (id, name, email, active)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                name   = excluded.name,
                email  = excluded.email,
                active = excluded.active",
        )
        .bind(&agent.id)
        .bind(&agent.name)
        .bind(&agent.email)
        .bind(agent.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AgentDirectory for SqliteAgentDirectory {
    async fn find_active_by_email(&self, email: &str) -> anyhow::Result<Option<Agent>> {
        let row = sqlx::query_as::<_, (String, String, String, bool)>(
            "SELECT id, name, email, active
             FROM agents
             WHERE email = ? COLLATE NOCASE AND active = 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Agent {
            id: r.0,
            name: r.1,
            email: r.2,
            active: r.3,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, crate::test_pool};

    #[tokio::test]
    async fn lookup_is_case_insensitive_and_skips_inactive() {
        let dir = SqliteAgentDirectory::new(test_pool().await);
        dir.upsert(&Agent {
            id: "a1".into(),
            name: "Maria".into(),
            email: "maria@acme.com".into(),
            active: true,
        })
        .await
        .unwrap();
        dir.upsert(&Agent {
            id: "a2".into(),
            name: "Niko".into(),
            email: "niko@acme.com".into(),
            active: false,
        })
        .await
        .unwrap();

        let found = dir.find_active_by_email("MARIA@ACME.COM").await.unwrap();
        assert_eq!(found.map(|a| a.id).as_deref(), Some("a1"));
        assert!(dir.find_active_by_email("niko@acme.com").await.unwrap().is_none());
        assert!(dir.find_active_by_email("ghost@acme.com").await.unwrap().is_none());
    }
}
