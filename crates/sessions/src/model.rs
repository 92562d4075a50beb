use std::collections::BTreeMap;

use {async_trait::async_trait, serde::Serialize};

use proptalk_common::now_epoch;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No template with the requested id is registered.
    #[error("unknown template: {template_id}")]
    UnknownTemplate { template_id: String },

    /// The requested transition is not legal from the session's status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// The underlying record store failed.
    #[error("session store failed: {0}")]
    Store(#[from] anyhow::Error),
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Collecting,
    Validating,
    Complete,
    Generating,
    Sent,
    Abandoned,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collecting => "collecting",
            Self::Validating => "validating",
            Self::Complete => "complete",
            Self::Generating => "generating",
            Self::Sent => "sent",
            Self::Abandoned => "abandoned",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "collecting" => Some(Self::Collecting),
            "validating" => Some(Self::Validating),
            "complete" => Some(Self::Complete),
            "generating" => Some(Self::Generating),
            "sent" => Some(Self::Sent),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Terminal statuses never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Abandoned)
    }

    /// A session still accepting field input.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Collecting | Self::Validating | Self::Complete)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-progress document collection.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    pub id: String,
    pub agent_id: String,
    pub template_id: String,
    /// Field name → raw collected value.
    pub fields: BTreeMap<String, String>,
    /// Required fields not collected yet, in template order.
    pub missing: Vec<String>,
    pub status: SessionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Validation rule attached to a field.
#[derive(Debug, Clone)]
pub enum FieldRule {
    Email,
    Url,
    Phone { min_digits: usize },
    Regex { pattern: String, message: String },
    Length { min: usize, max: usize },
    FreeText,
}

/// One field a template collects.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub description: String,
    pub example: String,
    pub rule: FieldRule,
    pub required: bool,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: &str, label: &str, description: &str, example: &str, rule: FieldRule) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: description.into(),
            example: example.into(),
            rule,
            required: true,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A document template: ordered field list. The textual document content
/// itself lives outside this system.
#[derive(Debug, Clone)]
pub struct DocumentTemplate {
    pub id: String,
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl DocumentTemplate {
    /// Names of required fields, in template order.
    #[must_use]
    pub fn required_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.clone())
            .collect()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Lookup of registered document templates (an external catalog; this system
/// only needs ids and field lists).
pub trait TemplateCatalog: Send + Sync {
    fn get(&self, template_id: &str) -> Option<&DocumentTemplate>;
    fn list(&self) -> Vec<&DocumentTemplate>;
}

/// Persistence seam for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The active (collecting/validating/complete) session for
    /// (agent, template), if any. At most one exists at a time.
    async fn active_for(
        &self,
        agent_id: &str,
        template_id: &str,
    ) -> anyhow::Result<Option<DocumentSession>>;

    /// The most recently updated active session for an agent across all
    /// templates, used to decide whether a message is session input.
    async fn latest_active_for_agent(
        &self,
        agent_id: &str,
    ) -> anyhow::Result<Option<DocumentSession>>;

    async fn insert(&self, session: &DocumentSession) -> anyhow::Result<()>;

    async fn update(&self, session: &DocumentSession) -> anyhow::Result<()>;

    /// Mark collecting sessions not updated since `idle_before` as abandoned.
    /// Returns how many were swept.
    async fn abandon_idle(&self, idle_before: i64) -> anyhow::Result<u64>;
}

impl DocumentSession {
    /// Fresh collecting session with every required field still missing.
    #[must_use]
    pub fn start(agent_id: &str, template: &DocumentTemplate) -> Self {
        let now = now_epoch();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            template_id: template.id.clone(),
            fields: BTreeMap::new(),
            missing: template.required_fields(),
            status: SessionStatus::Collecting,
            created_at: now,
            updated_at: now,
        }
    }
}
