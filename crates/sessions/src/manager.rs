//! Session lifecycle driver.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use tracing::{debug, info};

use proptalk_common::now_epoch;

use crate::{
    model::{
        DocumentSession, DocumentTemplate, Error, Result, SessionStatus, SessionStore,
        TemplateCatalog,
    },
    transform,
    validate::{FieldError, validate_field},
};

/// Result of merging new field values into a session.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub session: DocumentSession,
    /// Per-field validation failures, template order. Empty once the session
    /// reaches `complete`.
    pub errors: Vec<FieldError>,
}

/// Drives sessions through their lifecycle. All persistence goes through the
/// [`SessionStore`] seam; all template knowledge through [`TemplateCatalog`].
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    catalog: Arc<dyn TemplateCatalog>,
    idle_timeout: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        catalog: Arc<dyn TemplateCatalog>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            idle_timeout,
        }
    }

    fn template(&self, template_id: &str) -> Result<&DocumentTemplate> {
        self.catalog.get(template_id).ok_or_else(|| Error::UnknownTemplate {
            template_id: template_id.to_string(),
        })
    }

    /// Start a fresh session for (agent, template). An existing active
    /// session for the same pair is superseded: marked abandoned, kept for
    /// audit.
    pub async fn start_session(
        &self,
        agent_id: &str,
        template_id: &str,
    ) -> Result<DocumentSession> {
        let template = self.template(template_id)?;

        if let Some(mut previous) = self.store.active_for(agent_id, template_id).await? {
            previous.status = SessionStatus::Abandoned;
            previous.updated_at = now_epoch();
            self.store.update(&previous).await?;
            info!(
                agent_id,
                template_id,
                superseded = %previous.id,
                "superseded previous session"
            );
        }

        let session = DocumentSession::start(agent_id, template);
        self.store.insert(&session).await?;
        info!(agent_id, template_id, session_id = %session.id, "session started");
        Ok(session)
    }

    /// The agent's most recent active session, if any.
    pub async fn active_session(&self, agent_id: &str) -> Result<Option<DocumentSession>> {
        Ok(self.store.latest_active_for_agent(agent_id).await?)
    }

    /// Merge newly extracted fields, apply transforms, recompute the missing
    /// list, and re-validate. Advances status:
    /// collecting → validating once nothing is missing, → complete once
    /// validation also passes.
    pub async fn update_session(
        &self,
        mut session: DocumentSession,
        new_fields: BTreeMap<String, String>,
    ) -> Result<UpdateOutcome> {
        let template = self.template(&session.template_id)?;

        let transformed = transform::apply(template, new_fields);
        for (name, value) in transformed {
            if template.field(&name).is_some() {
                session.fields.insert(name, value);
            } else {
                debug!(session_id = %session.id, field = %name, "ignoring unknown field");
            }
        }

        let errors = revalidate(template, &mut session);
        session.updated_at = now_epoch();
        self.store.update(&session).await?;

        debug!(
            session_id = %session.id,
            status = %session.status,
            missing = session.missing.len(),
            errors = errors.len(),
            "session updated"
        );
        Ok(UpdateOutcome { session, errors })
    }

    /// Deterministic next-information prompt. Lists every still-missing field
    /// with label, description, and example in template order: all remaining
    /// fields at once, never one at a time.
    pub fn next_prompt(&self, session: &DocumentSession) -> Result<String> {
        let template = self.template(&session.template_id)?;

        match session.status {
            SessionStatus::Collecting => {
                let mut lines = vec![format!(
                    "To prepare the {}, I still need:",
                    template.name
                )];
                for name in &session.missing {
                    if let Some(spec) = template.field(name) {
                        lines.push(format!(
                            "\u{2022} {} \u{2014} {} (e.g. {})",
                            spec.label, spec.description, spec.example
                        ));
                    }
                }
                Ok(lines.join("\n"))
            },
            SessionStatus::Validating => {
                let errors = revalidate_readonly(template, session);
                let mut lines =
                    vec!["Almost there \u{2014} a few values need fixing:".to_string()];
                for error in errors {
                    lines.push(format!("\u{2022} {error}"));
                }
                Ok(lines.join("\n"))
            },
            _ => Ok(format!(
                "All details for the {} are in \u{2014} generating it now.",
                template.name
            )),
        }
    }

    /// `complete → generating`, once the caller begins document generation.
    pub async fn mark_generating(&self, session: &mut DocumentSession) -> Result<()> {
        self.transition(session, SessionStatus::Complete, SessionStatus::Generating)
            .await
    }

    /// `generating → sent`, once delivery succeeded.
    pub async fn mark_sent(&self, session: &mut DocumentSession) -> Result<()> {
        self.transition(session, SessionStatus::Generating, SessionStatus::Sent)
            .await
    }

    /// User abort: any non-terminal status → abandoned.
    pub async fn cancel(&self, session: &mut DocumentSession) -> Result<()> {
        if session.status.is_terminal() {
            return Err(Error::InvalidTransition {
                from: session.status,
                to: SessionStatus::Abandoned,
            });
        }
        session.status = SessionStatus::Abandoned;
        session.updated_at = now_epoch();
        self.store.update(session).await?;
        info!(session_id = %session.id, "session cancelled");
        Ok(())
    }

    /// Sweep collecting sessions idle past the configured age to abandoned.
    pub async fn sweep_idle(&self) -> Result<u64> {
        let cutoff = now_epoch() - self.idle_timeout.as_secs() as i64;
        let swept = self.store.abandon_idle(cutoff).await?;
        if swept > 0 {
            info!(swept, "idle sessions abandoned");
        }
        Ok(swept)
    }

    async fn transition(
        &self,
        session: &mut DocumentSession,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<()> {
        if session.status != from {
            return Err(Error::InvalidTransition {
                from: session.status,
                to,
            });
        }
        session.status = to;
        session.updated_at = now_epoch();
        self.store.update(session).await?;
        info!(session_id = %session.id, status = %to, "session transitioned");
        Ok(())
    }
}

/// Recompute `missing`, validate collected values, and set the status.
fn revalidate(template: &DocumentTemplate, session: &mut DocumentSession) -> Vec<FieldError> {
    session.missing = template
        .required_fields()
        .into_iter()
        .filter(|name| !session.fields.contains_key(name))
        .collect();

    let errors = revalidate_readonly(template, session);

    session.status = if !session.missing.is_empty() {
        SessionStatus::Collecting
    } else if !errors.is_empty() {
        SessionStatus::Validating
    } else {
        SessionStatus::Complete
    };

    errors
}

fn revalidate_readonly(template: &DocumentTemplate, session: &DocumentSession) -> Vec<FieldError> {
    template
        .fields
        .iter()
        .filter_map(|spec| {
            session
                .fields
                .get(&spec.name)
                .and_then(|value| validate_field(spec, value))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        crate::model::{FieldRule, FieldSpec},
        async_trait::async_trait,
        std::sync::Mutex,
    };

    struct MemoryStore {
        sessions: Mutex<Vec<DocumentSession>>,
    }

    impl MemoryStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sessions: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn active_for(
            &self,
            agent_id: &str,
            template_id: &str,
        ) -> anyhow::Result<Option<DocumentSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| {
                    s.agent_id == agent_id
                        && s.template_id == template_id
                        && s.status.is_active()
                })
                .cloned())
        }

        async fn latest_active_for_agent(
            &self,
            agent_id: &str,
        ) -> anyhow::Result<Option<DocumentSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.agent_id == agent_id && s.status.is_active())
                .max_by_key(|s| s.updated_at)
                .cloned())
        }

        async fn insert(&self, session: &DocumentSession) -> anyhow::Result<()> {
            self.sessions.lock().unwrap().push(session.clone());
            Ok(())
        }

        async fn update(&self, session: &DocumentSession) -> anyhow::Result<()> {
            let mut sessions = self.sessions.lock().unwrap();
            if let Some(slot) = sessions.iter_mut().find(|s| s.id == session.id) {
                *slot = session.clone();
            }
            Ok(())
        }

        async fn abandon_idle(&self, idle_before: i64) -> anyhow::Result<u64> {
            let mut sessions = self.sessions.lock().unwrap();
            let mut swept = 0;
            for s in sessions.iter_mut() {
                if s.status == SessionStatus::Collecting && s.updated_at < idle_before {
                    s.status = SessionStatus::Abandoned;
                    swept += 1;
                }
            }
            Ok(swept)
        }
    }

    struct Catalog {
        templates: Vec<DocumentTemplate>,
    }

    impl TemplateCatalog for Catalog {
        fn get(&self, template_id: &str) -> Option<&DocumentTemplate> {
            self.templates.iter().find(|t| t.id == template_id)
        }

        fn list(&self) -> Vec<&DocumentTemplate> {
            self.templates.iter().collect()
        }
    }

    fn abc_catalog() -> Arc<Catalog> {
        Arc::new(Catalog {
            templates: vec![DocumentTemplate {
                id: "reservation".into(),
                name: "reservation form".into(),
                fields: vec![
                    FieldSpec::new("a", "Client name", "full legal name", "Maria Georgiou", FieldRule::Length { min: 2, max: 80 }),
                    FieldSpec::new("b", "Client email", "contact email", "maria@acme.com", FieldRule::Email),
                    FieldSpec::new("c", "Reference", "listing reference", "AP-22", FieldRule::Regex {
                        pattern: r"^[A-Z]{2}-\d+$".into(),
                        message: "must look like AP-22".into(),
                    }),
                ],
            }],
        })
    }

    fn manager(store: Arc<MemoryStore>) -> SessionManager {
        SessionManager::new(store, abc_catalog(), Duration::from_secs(3600))
    }

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn supplying_one_of_three_fields_keeps_collecting() {
        let store = MemoryStore::new();
        let m = manager(Arc::clone(&store));
        let session = m.start_session("agent-1", "reservation").await.unwrap();
        assert_eq!(session.missing, vec!["a", "b", "c"]);

        let out = m
            .update_session(session, fields(&[("a", "Maria Georgiou")]))
            .await
            .unwrap();
        assert_eq!(out.session.status, SessionStatus::Collecting);
        assert_eq!(out.session.missing, vec!["b", "c"]);
        assert!(out.errors.is_empty());
    }

    #[tokio::test]
    async fn invalid_value_with_nothing_missing_is_validating() {
        let store = MemoryStore::new();
        let m = manager(Arc::clone(&store));
        let session = m.start_session("agent-1", "reservation").await.unwrap();

        let out = m
            .update_session(
                session,
                fields(&[("a", "Maria"), ("b", "maria@acme.com"), ("c", "wrong")]),
            )
            .await
            .unwrap();
        assert_eq!(out.session.status, SessionStatus::Validating);
        assert!(out.session.missing.is_empty());
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].field, "c");
    }

    #[tokio::test]
    async fn fixing_the_bad_value_completes() {
        let store = MemoryStore::new();
        let m = manager(Arc::clone(&store));
        let session = m.start_session("agent-1", "reservation").await.unwrap();
        let out = m
            .update_session(
                session,
                fields(&[("a", "Maria"), ("b", "maria@acme.com"), ("c", "wrong")]),
            )
            .await
            .unwrap();
        let out = m
            .update_session(out.session, fields(&[("c", "AP-22")]))
            .await
            .unwrap();
        assert_eq!(out.session.status, SessionStatus::Complete);
        assert!(out.errors.is_empty());
    }

    #[tokio::test]
    async fn next_prompt_lists_all_missing_fields_at_once() {
        let store = MemoryStore::new();
        let m = manager(Arc::clone(&store));
        let session = m.start_session("agent-1", "reservation").await.unwrap();
        let out = m
            .update_session(session, fields(&[("a", "Maria")]))
            .await
            .unwrap();

        let prompt = m.next_prompt(&out.session).unwrap();
        assert!(prompt.contains("Client email"));
        assert!(prompt.contains("Reference"));
        assert!(prompt.contains("maria@acme.com"), "examples are shown");
        assert!(!prompt.contains("Client name"), "collected fields are not re-asked");
    }

    #[tokio::test]
    async fn starting_again_supersedes_the_previous_session() {
        let store = MemoryStore::new();
        let m = manager(Arc::clone(&store));
        let first = m.start_session("agent-1", "reservation").await.unwrap();
        let second = m.start_session("agent-1", "reservation").await.unwrap();
        assert_ne!(first.id, second.id);

        let sessions = store.sessions.lock().unwrap();
        let old = sessions.iter().find(|s| s.id == first.id).unwrap();
        assert_eq!(old.status, SessionStatus::Abandoned, "kept for audit, not deleted");
    }

    #[tokio::test]
    async fn full_lifecycle_to_sent() {
        let store = MemoryStore::new();
        let m = manager(Arc::clone(&store));
        let session = m.start_session("agent-1", "reservation").await.unwrap();
        let out = m
            .update_session(
                session,
                fields(&[("a", "Maria"), ("b", "maria@acme.com"), ("c", "AP-22")]),
            )
            .await
            .unwrap();
        let mut session = out.session;
        m.mark_generating(&mut session).await.unwrap();
        assert_eq!(session.status, SessionStatus::Generating);
        m.mark_sent(&mut session).await.unwrap();
        assert_eq!(session.status, SessionStatus::Sent);
    }

    #[tokio::test]
    async fn mark_sent_from_collecting_is_rejected() {
        let store = MemoryStore::new();
        let m = manager(Arc::clone(&store));
        let mut session = m.start_session("agent-1", "reservation").await.unwrap();
        let result = m.mark_sent(&mut session).await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn unknown_template_is_a_typed_error() {
        let store = MemoryStore::new();
        let m = manager(store);
        let result = m.start_session("agent-1", "no-such-template").await;
        assert!(matches!(result, Err(Error::UnknownTemplate { .. })));
    }

    #[tokio::test]
    async fn idle_sweep_abandons_stale_collecting_sessions() {
        let store = MemoryStore::new();
        let m = SessionManager::new(Arc::clone(&store) as Arc<dyn SessionStore>, abc_catalog(), Duration::ZERO);
        let session = m.start_session("agent-1", "reservation").await.unwrap();

        // Age the session past the (zero) idle timeout.
        {
            let mut sessions = store.sessions.lock().unwrap();
            sessions[0].updated_at -= 10;
        }
        let swept = m.sweep_idle().await.unwrap();
        assert_eq!(swept, 1);
        assert!(m.active_session("agent-1").await.unwrap().is_none());
        let _ = session;
    }
}
