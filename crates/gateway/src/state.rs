use std::sync::Arc;

use {secrecy::{ExposeSecret, Secret}, tokio_util::task::TaskTracker};

use {
    proptalk_channels::{ConversationLog, UpdateDedup},
    proptalk_delivery::DeliveryService,
    proptalk_limits::FixedWindowLimiter,
    proptalk_registration::Registrar,
    proptalk_router::IntentRouter,
    proptalk_sessions::SessionManager,
};

/// Everything the webhook handlers and the processing pipeline share.
/// Constructed once at startup; all fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub registrar: Arc<Registrar>,
    pub intents: Arc<IntentRouter>,
    pub delivery: Arc<DeliveryService>,
    pub dedup: Arc<dyn UpdateDedup>,
    pub conversation: Arc<dyn ConversationLog>,
    pub sessions: Arc<SessionManager>,
    pub telegram_limiter: FixedWindowLimiter,
    pub whatsapp_limiter: FixedWindowLimiter,
    pub webhook_secret: Secret<String>,
    /// Post-ack processing tasks; closed and awaited on shutdown.
    pub tracker: TaskTracker,
}

impl AppState {
    /// Telegram secret-header check. An empty configured secret never
    /// matches, so an unconfigured deployment rejects all webhook traffic.
    #[must_use]
    pub fn telegram_secret_matches(&self, header_value: &str) -> bool {
        let secret = self.webhook_secret.expose_secret();
        !secret.is_empty() && secret == header_value
    }
}
