//! Intent routing.
//!
//! Given an authenticated, de-duplicated, rate-limit-cleared message from a
//! registered agent, produce exactly one reply: a forward-command execution,
//! a document-session step, or a delegated AI answer (optionally carrying
//! calculator tool calls). The caller delivers the reply.

pub mod fields;
pub mod forward;
pub mod provider;

pub use {
    forward::{ForwardCommand, ForwardParse},
    proptalk_calculators::CalculatorRegistry,
    provider::{AiProvider, AiReply, ToolCall},
};

use std::sync::Arc;

use tracing::{error, warn};

use {
    proptalk_channels::{ConversationLog, ForwardLog, ForwardRequest, ForwardStatus, TextFormat},
    proptalk_common::{InboundUpdate, now_epoch},
    proptalk_delivery::{DeliveryOutcome, DeliveryService, mask_destination},
    proptalk_sessions::{DocumentSession, SessionManager, SessionStatus, TemplateCatalog},
};

/// The one generic failure reply. Users never see provider error strings.
pub const APOLOGY: &str =
    "Sorry, something went wrong on my side. Please try again in a moment.";

const HELP: &str = "Here's what I can do:\n\
    \u{2022} Answer questions about listings, fees, and taxes\n\
    \u{2022} forward to <phone>: <message> \u{2014} relay a message to the other platform\n\
    \u{2022} /document <template> \u{2014} start collecting details for a document\n\
    \u{2022} /documents \u{2014} list available document templates\n\
    \u{2022} /cancel \u{2014} abandon the document in progress\n\
    \u{2022} /unregister \u{2014} unlink this chat from your agent account";

/// Routes one registered-user message to exactly one intent.
pub struct IntentRouter {
    sessions: Arc<SessionManager>,
    catalog: Arc<dyn TemplateCatalog>,
    delivery: Arc<DeliveryService>,
    forwards: Arc<dyn ForwardLog>,
    conversation: Arc<dyn ConversationLog>,
    calculators: CalculatorRegistry,
    provider: Arc<dyn AiProvider>,
    history_limit: u32,
}

impl IntentRouter {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionManager>,
        catalog: Arc<dyn TemplateCatalog>,
        delivery: Arc<DeliveryService>,
        forwards: Arc<dyn ForwardLog>,
        conversation: Arc<dyn ConversationLog>,
        calculators: CalculatorRegistry,
        provider: Arc<dyn AiProvider>,
        history_limit: u32,
    ) -> Self {
        Self {
            sessions,
            catalog,
            delivery,
            forwards,
            conversation,
            calculators,
            provider,
            history_limit,
        }
    }

    /// Produce the reply for one message. Infallible by contract: every
    /// internal failure path collapses into a corrective prompt or the
    /// generic apology, never an error the gatekeeper would have to handle.
    pub async fn route(&self, update: &InboundUpdate, agent_id: &str) -> String {
        match forward::parse(&update.text) {
            ForwardParse::Invalid(correction) => return correction,
            ForwardParse::Command(cmd) => return self.run_forward(update, cmd).await,
            ForwardParse::NotAForward => {},
        }

        let trimmed = update.text.trim();
        if trimmed.eq_ignore_ascii_case("/help") {
            return HELP.to_string();
        }
        if trimmed.eq_ignore_ascii_case("/documents")
            || trimmed.eq_ignore_ascii_case("/document")
        {
            return self.list_templates();
        }
        if let Some(rest) = strip_command(trimmed, "/document") {
            return self.start_document(agent_id, rest.trim()).await;
        }
        if trimmed.eq_ignore_ascii_case("/cancel") {
            return self.cancel_document(agent_id).await;
        }

        match self.sessions.active_session(agent_id).await {
            Ok(Some(session)) => self.continue_session(session, &update.text).await,
            Ok(None) => self.delegate_to_ai(update).await,
            Err(e) => {
                error!(agent_id, error = %e, "session lookup failed");
                APOLOGY.to_string()
            },
        }
    }

    async fn run_forward(&self, update: &InboundUpdate, cmd: ForwardCommand) -> String {
        let dest_platform = update.platform.other();
        let outcome = self
            .delivery
            .send(dest_platform, &cmd.phone, &cmd.body, TextFormat::Plain)
            .await;

        let (status, error) = match &outcome {
            DeliveryOutcome::Delivered { .. } => (ForwardStatus::Sent, None),
            DeliveryOutcome::PermanentFailure { error, .. } => {
                (ForwardStatus::Failed, Some(error.to_string()))
            },
            DeliveryOutcome::RetriesExhausted { last_error, .. } => {
                (ForwardStatus::Failed, Some(last_error.to_string()))
            },
            DeliveryOutcome::NotAttempted { reason } => {
                (ForwardStatus::Failed, Some(reason.clone()))
            },
        };

        let record = ForwardRequest {
            source_platform: update.platform,
            source_chat_id: update.chat_id.clone(),
            dest_platform,
            dest_phone: cmd.phone.clone(),
            body: cmd.body,
            status,
            error,
            created_at: now_epoch(),
        };
        if let Err(e) = self.forwards.record(record).await {
            // Audit-log failure must not block the user-facing outcome.
            warn!(error = %e, "failed to record forward request");
        }

        let masked = mask_destination(&cmd.phone);
        match outcome {
            DeliveryOutcome::Delivered { .. } => {
                format!("Forwarded your message to {masked} on {dest_platform}.")
            },
            DeliveryOutcome::PermanentFailure { error, .. }
                if matches!(
                    error,
                    proptalk_channels::SendError::InvalidDestination { .. }
                ) =>
            {
                format!("I couldn't forward that: {masked} isn't a valid destination number.")
            },
            DeliveryOutcome::RetriesExhausted { .. } => format!(
                "I couldn't reach {masked} right now. Please try again in a few minutes."
            ),
            _ => format!("I couldn't forward your message to {masked}."),
        }
    }

    fn list_templates(&self) -> String {
        let mut lines = vec!["Available documents:".to_string()];
        for template in self.catalog.list() {
            lines.push(format!("\u{2022} /document {} \u{2014} {}", template.id, template.name));
        }
        lines.join("\n")
    }

    async fn start_document(&self, agent_id: &str, template_id: &str) -> String {
        match self.sessions.start_session(agent_id, template_id).await {
            Ok(session) => self
                .sessions
                .next_prompt(&session)
                .unwrap_or_else(|_| APOLOGY.to_string()),
            Err(proptalk_sessions::Error::UnknownTemplate { .. }) => format!(
                "I don't know a document called '{template_id}'.\n{}",
                self.list_templates()
            ),
            Err(e) => {
                error!(agent_id, template_id, error = %e, "failed to start session");
                APOLOGY.to_string()
            },
        }
    }

    async fn cancel_document(&self, agent_id: &str) -> String {
        match self.sessions.active_session(agent_id).await {
            Ok(Some(mut session)) => match self.sessions.cancel(&mut session).await {
                Ok(()) => "Okay, I've discarded that document.".to_string(),
                Err(e) => {
                    error!(agent_id, error = %e, "failed to cancel session");
                    APOLOGY.to_string()
                },
            },
            Ok(None) => "There's no document in progress to cancel.".to_string(),
            Err(e) => {
                error!(agent_id, error = %e, "session lookup failed");
                APOLOGY.to_string()
            },
        }
    }

    async fn continue_session(&self, session: DocumentSession, text: &str) -> String {
        let Some(template) = self.catalog.get(&session.template_id) else {
            warn!(template_id = %session.template_id, "active session references unknown template");
            return APOLOGY.to_string();
        };

        let extracted = fields::extract(template, &session, text);
        if extracted.is_empty() {
            let reminder = self
                .sessions
                .next_prompt(&session)
                .unwrap_or_else(|_| APOLOGY.to_string());
            return format!(
                "I couldn't match that to any of the details I still need.\n\n{reminder}"
            );
        }

        let outcome = match self.sessions.update_session(session, extracted).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "failed to update session");
                return APOLOGY.to_string();
            },
        };

        if outcome.session.status == SessionStatus::Complete {
            return self.finish_session(outcome.session).await;
        }
        self.sessions
            .next_prompt(&outcome.session)
            .unwrap_or_else(|_| APOLOGY.to_string())
    }

    /// All fields collected and valid: run generation and report the result.
    /// Template content itself lives outside this system, so "generation"
    /// here is the confirmation summary of the collected values.
    async fn finish_session(&self, mut session: DocumentSession) -> String {
        let template = self.catalog.get(&session.template_id);
        let template_name =
            template.map_or_else(|| session.template_id.clone(), |t| t.name.clone());

        if let Err(e) = self.sessions.mark_generating(&mut session).await {
            error!(session_id = %session.id, error = %e, "failed to mark session generating");
            return APOLOGY.to_string();
        }

        let mut lines = vec![format!("The {template_name} is ready. Collected details:")];
        for (name, value) in &session.fields {
            // Prompts address fields by label; the summary does the same.
            let label = template
                .and_then(|t| t.fields.iter().find(|f| &f.name == name))
                .map_or(name.as_str(), |f| f.label.as_str());
            lines.push(format!("\u{2022} {label}: {value}"));
        }

        if let Err(e) = self.sessions.mark_sent(&mut session).await {
            error!(session_id = %session.id, error = %e, "failed to mark session sent");
            return APOLOGY.to_string();
        }
        lines.join("\n")
    }

    async fn delegate_to_ai(&self, update: &InboundUpdate) -> String {
        let history = match self
            .conversation
            .recent(update.platform, &update.chat_id, self.history_limit)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                // History is an enrichment; answer without it.
                warn!(error = %e, "failed to load conversation history");
                Vec::new()
            },
        };

        let reply = match self.provider.complete(&history, &update.text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "ai provider failed");
                return APOLOGY.to_string();
            },
        };

        let mut text = reply.text;
        for call in reply.tool_calls {
            let invocation = self.calculators.execute(&call.name, &call.arguments);
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&invocation.render());
        }
        if text.is_empty() {
            APOLOGY.to_string()
        } else {
            text
        }
    }
}

/// `"/document listing x"` → `Some(" listing x")`; bare `/document` and
/// non-matches return `None`.
fn strip_command<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    if text.len() <= command.len() {
        return None;
    }
    let (head, rest) = text.split_at(command.len());
    (head.eq_ignore_ascii_case(command) && rest.starts_with(char::is_whitespace)).then_some(rest)
}
