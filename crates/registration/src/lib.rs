//! Per-platform-user registration state machine.
//!
//! `unregistered → awaiting_email → registered`. The awaiting-email step is
//! held only in process memory: a restart mid-registration simply restarts
//! the flow. Once registered, the binding is a durable
//! [`proptalk_channels::PlatformUser`] row, soft-deleted on `/unregister`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{info, warn};

use {
    proptalk_channels::{AgentDirectory, PlatformUser, UserStore},
    proptalk_common::{Platform, is_valid_email, now_epoch},
};

pub mod messages {
    pub const EMAIL_PROMPT: &str = "Welcome to PropTalk! To get started, please reply with the \
                                    email address you use with the agency.";
    pub const EMAIL_REPROMPT: &str = "That doesn't look like an email address. Please send the \
                                      email you use with the agency (e.g. maria@acme.com).";
    pub const NO_AGENT_FOUND: &str = "I couldn't find an active agent with that email. Please \
                                      check with your office administrator, then message me again.";
    pub const UNREGISTERED: &str = "You've been unregistered. Message me any time to register \
                                    again.";
}

/// Per-user registration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    AwaitingEmail,
    Registered,
}

/// What the pipeline should do with the message after the registration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The sender is registered; the message continues to the intent router.
    Registered { agent_id: String },
    /// The message was consumed by the registration flow; send this reply
    /// and stop.
    Consumed { reply: String },
}

type PendingKey = (Platform, String);

/// Registration state machine over the user store and agent directory.
pub struct Registrar {
    users: Arc<dyn UserStore>,
    agents: Arc<dyn AgentDirectory>,
    /// Users currently mid-registration. Process-local; a restart restarts
    /// the email prompt.
    pending: Mutex<HashMap<PendingKey, i64>>,
}

impl Registrar {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, agents: Arc<dyn AgentDirectory>) -> Self {
        Self {
            users,
            agents,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Current state for a sender, for diagnostics and tests.
    pub async fn state(&self, platform: Platform, sender_id: &str) -> anyhow::Result<RegistrationState> {
        if self.is_pending(platform, sender_id) {
            return Ok(RegistrationState::AwaitingEmail);
        }
        let user = self.users.get(platform, sender_id).await?;
        Ok(match user {
            Some(u) if u.active && u.agent_id.is_some() => RegistrationState::Registered,
            _ => RegistrationState::Unregistered,
        })
    }

    /// Run the registration step for one inbound message.
    ///
    /// A registered sender gets their last-active timestamp bumped and the
    /// message passes through; anything else is consumed by the flow.
    pub async fn handle_message(
        &self,
        platform: Platform,
        sender_id: &str,
        sender_name: Option<&str>,
        text: &str,
    ) -> anyhow::Result<RegistrationOutcome> {
        let user = self.users.get(platform, sender_id).await?;
        let registered_agent = user
            .as_ref()
            .filter(|u| u.active)
            .and_then(|u| u.agent_id.clone());
        if let Some(agent_id) = registered_agent {
            if text.trim().eq_ignore_ascii_case("/unregister") {
                self.users.deactivate(platform, sender_id).await?;
                info!(%platform, sender_id, %agent_id, "user unregistered");
                return Ok(RegistrationOutcome::Consumed {
                    reply: messages::UNREGISTERED.to_string(),
                });
            }
            // Side effect before routing: keep the activity timestamp fresh.
            if let Err(e) = self
                .users
                .touch_last_active(platform, sender_id, now_epoch())
                .await
            {
                warn!(%platform, sender_id, error = %e, "failed to touch last-active");
            }
            return Ok(RegistrationOutcome::Registered { agent_id });
        }

        if self.is_pending(platform, sender_id) {
            return self
                .handle_email_reply(platform, sender_id, sender_name, text)
                .await;
        }

        // First contact (or a deactivated returning user): start the flow.
        self.set_pending(platform, sender_id);
        info!(%platform, sender_id, "registration started, awaiting email");
        Ok(RegistrationOutcome::Consumed {
            reply: messages::EMAIL_PROMPT.to_string(),
        })
    }

    async fn handle_email_reply(
        &self,
        platform: Platform,
        sender_id: &str,
        sender_name: Option<&str>,
        text: &str,
    ) -> anyhow::Result<RegistrationOutcome> {
        let email = text.trim();

        if !is_valid_email(email) {
            // Invalid: re-prompt, stay in awaiting_email.
            return Ok(RegistrationOutcome::Consumed {
                reply: messages::EMAIL_REPROMPT.to_string(),
            });
        }

        let Some(agent) = self.agents.find_active_by_email(email).await? else {
            // Valid email, no matching active agent: back to unregistered.
            self.clear_pending(platform, sender_id);
            info!(%platform, sender_id, "no active agent for supplied email");
            return Ok(RegistrationOutcome::Consumed {
                reply: messages::NO_AGENT_FOUND.to_string(),
            });
        };

        let now = now_epoch();
        self.users
            .upsert(PlatformUser {
                platform,
                external_user_id: sender_id.to_string(),
                agent_id: Some(agent.id.clone()),
                display_name: sender_name.map(str::to_string),
                last_active_at: now,
                active: true,
            })
            .await?;
        self.clear_pending(platform, sender_id);
        info!(%platform, sender_id, agent_id = %agent.id, "user registered");

        // The triggering message is consumed by registration; it never
        // reaches the intent router.
        Ok(RegistrationOutcome::Consumed {
            reply: format!(
                "Welcome, {}! You're all set. Ask me anything, or type /help to see what I can do.",
                agent.name
            ),
        })
    }

    fn is_pending(&self, platform: Platform, sender_id: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&(platform, sender_id.to_string()))
    }

    fn set_pending(&self, platform: Platform, sender_id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((platform, sender_id.to_string()), now_epoch());
    }

    fn clear_pending(&self, platform: Platform, sender_id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(platform, sender_id.to_string()));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        proptalk_channels::Agent,
        std::sync::Mutex as StdMutex,
    };

    struct MemoryUsers {
        rows: StdMutex<Vec<PlatformUser>>,
    }

    impl MemoryUsers {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                rows: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl UserStore for MemoryUsers {
        async fn get(
            &self,
            platform: Platform,
            external_user_id: &str,
        ) -> anyhow::Result<Option<PlatformUser>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.platform == platform && u.external_user_id == external_user_id)
                .cloned())
        }

        async fn upsert(&self, user: PlatformUser) -> anyhow::Result<()> {
            let mut rows = self.rows.lock().unwrap();
            rows.retain(|u| {
                !(u.platform == user.platform && u.external_user_id == user.external_user_id)
            });
            rows.push(user);
            Ok(())
        }

        async fn touch_last_active(
            &self,
            platform: Platform,
            external_user_id: &str,
            at: i64,
        ) -> anyhow::Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(u) = rows
                .iter_mut()
                .find(|u| u.platform == platform && u.external_user_id == external_user_id)
            {
                u.last_active_at = at;
            }
            Ok(())
        }

        async fn deactivate(
            &self,
            platform: Platform,
            external_user_id: &str,
        ) -> anyhow::Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(u) = rows
                .iter_mut()
                .find(|u| u.platform == platform && u.external_user_id == external_user_id)
            {
                u.active = false;
            }
            Ok(())
        }
    }

    struct StaticAgents {
        agents: Vec<Agent>,
    }

    #[async_trait]
    impl AgentDirectory for StaticAgents {
        async fn find_active_by_email(&self, email: &str) -> anyhow::Result<Option<Agent>> {
            Ok(self
                .agents
                .iter()
                .find(|a| a.active && a.email.eq_ignore_ascii_case(email))
                .cloned())
        }
    }

    fn registrar() -> (Registrar, Arc<MemoryUsers>) {
        let users = MemoryUsers::new();
        let agents = Arc::new(StaticAgents {
            agents: vec![Agent {
                id: "agent-7".into(),
                name: "Maria".into(),
                email: "maria@acme.com".into(),
                active: true,
            }],
        });
        (Registrar::new(Arc::clone(&users) as Arc<dyn UserStore>, agents), users)
    }

    #[tokio::test]
    async fn unknown_user_gets_email_prompt_and_awaits() {
        let (r, _) = registrar();
        let outcome = r
            .handle_message(Platform::Telegram, "u1", None, "hello")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Consumed {
            reply: messages::EMAIL_PROMPT.to_string()
        });
        assert_eq!(
            r.state(Platform::Telegram, "u1").await.unwrap(),
            RegistrationState::AwaitingEmail
        );
    }

    #[tokio::test]
    async fn invalid_email_reprompts_and_stays_awaiting() {
        let (r, _) = registrar();
        r.handle_message(Platform::Telegram, "u1", None, "hi")
            .await
            .unwrap();
        let outcome = r
            .handle_message(Platform::Telegram, "u1", None, "not-an-email")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Consumed {
            reply: messages::EMAIL_REPROMPT.to_string()
        });
        assert_eq!(
            r.state(Platform::Telegram, "u1").await.unwrap(),
            RegistrationState::AwaitingEmail
        );
    }

    #[tokio::test]
    async fn unknown_email_drops_back_to_unregistered() {
        let (r, _) = registrar();
        r.handle_message(Platform::Telegram, "u1", None, "hi")
            .await
            .unwrap();
        let outcome = r
            .handle_message(Platform::Telegram, "u1", None, "nobody@acme.com")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Consumed {
            reply: messages::NO_AGENT_FOUND.to_string()
        });
        assert_eq!(
            r.state(Platform::Telegram, "u1").await.unwrap(),
            RegistrationState::Unregistered
        );
    }

    #[tokio::test]
    async fn matching_email_registers_and_welcomes_once() {
        let (r, users) = registrar();
        r.handle_message(Platform::Telegram, "u1", Some("Maria G"), "hi")
            .await
            .unwrap();
        let outcome = r
            .handle_message(Platform::Telegram, "u1", Some("Maria G"), "MARIA@acme.com")
            .await
            .unwrap();
        match outcome {
            RegistrationOutcome::Consumed { reply } => {
                assert!(reply.contains("Welcome, Maria"));
            },
            other => panic!("expected welcome, got {other:?}"),
        }
        assert_eq!(
            r.state(Platform::Telegram, "u1").await.unwrap(),
            RegistrationState::Registered
        );
        let rows = users.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].agent_id.as_deref(), Some("agent-7"));
    }

    #[tokio::test]
    async fn registered_user_passes_through_with_fresh_last_active() {
        let (r, users) = registrar();
        r.handle_message(Platform::Telegram, "u1", None, "hi")
            .await
            .unwrap();
        r.handle_message(Platform::Telegram, "u1", None, "maria@acme.com")
            .await
            .unwrap();
        {
            users.rows.lock().unwrap()[0].last_active_at = 0;
        }
        let outcome = r
            .handle_message(Platform::Telegram, "u1", None, "what are the fees?")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Registered {
            agent_id: "agent-7".into()
        });
        assert!(users.rows.lock().unwrap()[0].last_active_at > 0);
    }

    #[tokio::test]
    async fn unregister_soft_deletes_and_restarts_the_flow() {
        let (r, users) = registrar();
        r.handle_message(Platform::Telegram, "u1", None, "hi")
            .await
            .unwrap();
        r.handle_message(Platform::Telegram, "u1", None, "maria@acme.com")
            .await
            .unwrap();

        let outcome = r
            .handle_message(Platform::Telegram, "u1", None, "/unregister")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Consumed {
            reply: messages::UNREGISTERED.to_string()
        });
        // The row survives, deactivated.
        assert_eq!(users.rows.lock().unwrap().len(), 1);
        assert!(!users.rows.lock().unwrap()[0].active);

        // Next message restarts registration rather than routing.
        let outcome = r
            .handle_message(Platform::Telegram, "u1", None, "hello again")
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::Consumed {
            reply: messages::EMAIL_PROMPT.to_string()
        });
    }

    #[tokio::test]
    async fn platforms_do_not_share_registration_state() {
        let (r, _) = registrar();
        r.handle_message(Platform::Telegram, "u1", None, "hi")
            .await
            .unwrap();
        assert_eq!(
            r.state(Platform::Whatsapp, "u1").await.unwrap(),
            RegistrationState::Unregistered
        );
    }
}
