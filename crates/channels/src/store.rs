use {async_trait::async_trait, serde::Serialize};

use proptalk_common::Platform;

/// A chat-platform account bound to an internal agent.
///
/// Created on first successful registration. Deactivated, never hard-deleted,
/// on unregister.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformUser {
    pub platform: Platform,
    pub external_user_id: String,
    /// Internal agent id; set once registered.
    pub agent_id: Option<String>,
    pub display_name: Option<String>,
    pub last_active_at: i64,
    pub active: bool,
}

/// An internal business user (real-estate agent).
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub email: String,
    pub active: bool,
}

/// Audit row for one cross-platform forward attempt. Write-once.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub source_platform: Platform,
    pub source_chat_id: String,
    pub dest_platform: Platform,
    pub dest_phone: String,
    pub body: String,
    pub status: ForwardStatus,
    pub error: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardStatus {
    Pending,
    Sent,
    Failed,
}

impl ForwardStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Registered platform users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(
        &self,
        platform: Platform,
        external_user_id: &str,
    ) -> anyhow::Result<Option<PlatformUser>>;

    /// Insert or replace the row for `(platform, external_user_id)`.
    /// Re-registration after an unregister reactivates the same row.
    async fn upsert(&self, user: PlatformUser) -> anyhow::Result<()>;

    /// Bump `last_active_at`; a no-op for unknown users.
    async fn touch_last_active(
        &self,
        platform: Platform,
        external_user_id: &str,
        at: i64,
    ) -> anyhow::Result<()>;

    /// Soft-delete: clear `active`, keep the row.
    async fn deactivate(&self, platform: Platform, external_user_id: &str) -> anyhow::Result<()>;
}

/// Lookup of internal agents during registration.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Case-insensitive email match; inactive agents are never returned.
    async fn find_active_by_email(&self, email: &str) -> anyhow::Result<Option<Agent>>;
}

/// Append-only audit log of forward attempts.
#[async_trait]
pub trait ForwardLog: Send + Sync {
    async fn record(&self, request: ForwardRequest) -> anyhow::Result<()>;
}

/// Inbound update deduplication, backed by a durable uniqueness constraint.
#[async_trait]
pub trait UpdateDedup: Send + Sync {
    /// Record `(platform, external_id)` as seen. Returns `true` if this is
    /// the first delivery, `false` if it was already processed. Only
    /// uniqueness violations map to `false`; other storage errors propagate.
    async fn record_seen(&self, platform: Platform, external_id: &str) -> anyhow::Result<bool>;
}
