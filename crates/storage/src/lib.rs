//! SQLite-backed implementations of the persistence seams.
//!
//! Every store takes an `SqlitePool` and exposes an `init(pool)` that creates
//! its schema, so tests can run against `sqlite::memory:` without a migration
//! step.

mod conversation;
mod dedup;
mod directory;
mod forwards;
mod sessions;
mod users;

pub use {
    conversation::SqliteConversationLog,
    dedup::SqliteUpdateDedup,
    directory::SqliteAgentDirectory,
    forwards::SqliteForwardLog,
    sessions::SqliteSessionStore,
    users::SqliteUserStore,
};

use sqlx::SqlitePool;

/// Create every table and index this crate owns.
pub async fn init_all(pool: &SqlitePool) -> anyhow::Result<()> {
    SqliteUserStore::init(pool).await?;
    SqliteAgentDirectory::init(pool).await?;
    SqliteForwardLog::init(pool).await?;
    SqliteUpdateDedup::init(pool).await?;
    SqliteConversationLog::init(pool).await?;
    SqliteSessionStore::init(pool).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_all(&pool).await.expect("schema init");
    pool
}
