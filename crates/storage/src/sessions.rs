use std::collections::BTreeMap;

use {
    anyhow::Context,
    async_trait::async_trait,
    proptalk_sessions::{DocumentSession, SessionStatus, SessionStore},
    sqlx::SqlitePool,
};

/// SQLite-backed document-session store.
///
/// Collected fields and the missing-field list are stored as JSON text;
/// queries only ever filter on status and timestamps.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_sessions (
                id          TEXT    PRIMARY KEY,
                agent_id    TEXT    NOT NULL,
                template_id TEXT    NOT NULL,
                fields      TEXT    NOT NULL,
                missing     TEXT    NOT NULL,
                status      TEXT    NOT NULL,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_agent_status
             ON document_sessions (agent_id, status, updated_at DESC)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

type SessionRow = (String, String, String, String, String, String, i64, i64);

fn from_row(r: SessionRow) -> anyhow::Result<DocumentSession> {
    let fields: BTreeMap<String, String> =
        serde_json::from_str(&r.3).context("corrupt session fields")?;
    let missing: Vec<String> = serde_json::from_str(&r.4).context("corrupt session missing list")?;
    let status = SessionStatus::parse(&r.5)
        .with_context(|| format!("unknown session status: {}", r.5))?;
    Ok(DocumentSession {
        id: r.0,
        agent_id: r.1,
        template_id: r.2,
        fields,
        missing,
        status,
        created_at: r.6,
        updated_at: r.7,
    })
}

const SESSION_COLUMNS: &str =
    "id, agent_id, template_id, fields, missing, status, created_at, updated_at";

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn active_for(
        &self,
        agent_id: &str,
        template_id: &str,
    ) -> anyhow::Result<Option<DocumentSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS}
             FROM document_sessions
             WHERE agent_id = ? AND template_id = ?
               AND status IN ('collecting', 'validating', 'complete')
             ORDER BY updated_at DESC
             LIMIT 1"
        ))
        .bind(agent_id)
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    async fn latest_active_for_agent(
        &self,
        agent_id: &str,
    ) -> anyhow::Result<Option<DocumentSession>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS}
             FROM document_sessions
             WHERE agent_id = ?
               AND status IN ('collecting', 'validating', 'complete')
             ORDER BY updated_at DESC
             LIMIT 1"
        ))
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).transpose()
    }

    async fn insert(&self, session: &DocumentSession) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO document_sessions
             (id, agent_id, template_id, fields, missing, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.agent_id)
        .bind(&session.template_id)
        .bind(serde_json::to_string(&session.fields)?)
        .bind(serde_json::to_string(&session.missing)?)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, session: &DocumentSession) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE document_sessions
             SET fields = ?, missing = ?, status = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(serde_json::to_string(&session.fields)?)
        .bind(serde_json::to_string(&session.missing)?)
        .bind(session.status.as_str())
        .bind(session.updated_at)
        .bind(&session.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn abandon_idle(&self, idle_before: i64) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE document_sessions
             SET status = 'abandoned'
             WHERE status IN ('collecting', 'validating')
               AND updated_at < ?",
        )
        .bind(idle_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::test_pool,
        proptalk_sessions::{DocumentTemplate, FieldRule, FieldSpec},
    };

    fn template() -> DocumentTemplate {
        DocumentTemplate {
            id: "listing_agreement".into(),
            name: "Listing agreement".into(),
            fields: vec![FieldSpec::new(
                "client_name",
                "Client name",
                "Full legal name",
                "Andreas Georgiou",
                FieldRule::FreeText,
            )],
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_roundtrips() {
        let store = SqliteSessionStore::new(test_pool().await);
        let mut session = DocumentSession::start("agent-1", &template());
        session.fields.insert("client_name".into(), "Andreas".into());
        store.insert(&session).await.unwrap();

        let got = store
            .active_for("agent-1", "listing_agreement")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.id, session.id);
        assert_eq!(got.fields.get("client_name").map(String::as_str), Some("Andreas"));
        assert_eq!(got.status, SessionStatus::Collecting);
    }

    #[tokio::test]
    async fn terminal_sessions_are_not_active() {
        let store = SqliteSessionStore::new(test_pool().await);
        let mut session = DocumentSession::start("agent-1", &template());
        store.insert(&session).await.unwrap();

        session.status = SessionStatus::Abandoned;
        store.update(&session).await.unwrap();

        assert!(store
            .active_for("agent-1", "listing_agreement")
            .await
            .unwrap()
            .is_none());
        assert!(store.latest_active_for_agent("agent-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_active_prefers_most_recently_updated() {
        let store = SqliteSessionStore::new(test_pool().await);
        let mut older = DocumentSession::start("agent-1", &template());
        older.updated_at = 100;
        let mut newer = DocumentSession::start("agent-1", &DocumentTemplate {
            id: "viewing_form".into(),
            name: "Viewing form".into(),
            fields: vec![],
        });
        newer.updated_at = 200;
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();

        let got = store.latest_active_for_agent("agent-1").await.unwrap().unwrap();
        assert_eq!(got.id, newer.id);
    }

    #[tokio::test]
    async fn abandon_idle_only_sweeps_stale_collecting() {
        let store = SqliteSessionStore::new(test_pool().await);
        let mut stale = DocumentSession::start("agent-1", &template());
        stale.updated_at = 100;
        let mut fresh = DocumentSession::start("agent-2", &template());
        fresh.updated_at = 5_000;
        let mut complete = DocumentSession::start("agent-3", &template());
        complete.status = SessionStatus::Complete;
        complete.updated_at = 100;
        store.insert(&stale).await.unwrap();
        store.insert(&fresh).await.unwrap();
        store.insert(&complete).await.unwrap();

        let swept = store.abandon_idle(1_000).await.unwrap();
        assert_eq!(swept, 1);
        assert!(store.active_for("agent-1", "listing_agreement").await.unwrap().is_none());
        assert!(store.active_for("agent-2", "listing_agreement").await.unwrap().is_some());
        // Complete sessions are waiting on generation, not on the agent.
        assert!(store.active_for("agent-3", "listing_agreement").await.unwrap().is_some());
    }
}
