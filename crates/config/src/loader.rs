//! Build a [`Config`] from `PROPTALK_*` environment variables.

use {secrecy::Secret, tracing::debug};

use crate::schema::{
    AiConfig, Config, LimitsConfig, ServerConfig, SessionsConfig, StorageConfig, TelegramConfig,
    WhatsAppConfig,
};

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    match var(name).map(|v| v.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            debug!(name, "unparseable value, using default");
            default
        },
        None => default,
    }
}

/// Read the full configuration from the environment. Missing variables fall
/// back to defaults; [`crate::validate`] reports what is actually unusable.
#[must_use]
pub fn from_env() -> Config {
    let defaults = Config::default();

    Config {
        server: ServerConfig {
            bind: var("PROPTALK_BIND").unwrap_or(defaults.server.bind),
            port: parsed("PROPTALK_PORT", defaults.server.port),
        },
        telegram: TelegramConfig {
            bot_token: Secret::new(var("PROPTALK_TELEGRAM_BOT_TOKEN").unwrap_or_default()),
            webhook_secret: Secret::new(var("PROPTALK_TELEGRAM_WEBHOOK_SECRET").unwrap_or_default()),
            api_base: var("PROPTALK_TELEGRAM_API_BASE").unwrap_or(defaults.telegram.api_base),
        },
        whatsapp: WhatsAppConfig {
            account_sid: var("PROPTALK_WHATSAPP_ACCOUNT_SID").unwrap_or_default(),
            auth_token: Secret::new(var("PROPTALK_WHATSAPP_AUTH_TOKEN").unwrap_or_default()),
            from_number: var("PROPTALK_WHATSAPP_FROM").unwrap_or_default(),
            api_base: var("PROPTALK_WHATSAPP_API_BASE").unwrap_or(defaults.whatsapp.api_base),
        },
        ai: AiConfig {
            api_key: Secret::new(var("PROPTALK_AI_API_KEY").unwrap_or_default()),
            model: var("PROPTALK_AI_MODEL").unwrap_or(defaults.ai.model),
            api_base: var("PROPTALK_AI_API_BASE").unwrap_or(defaults.ai.api_base),
            timeout_secs: parsed("PROPTALK_AI_TIMEOUT_SECS", defaults.ai.timeout_secs),
            history_limit: parsed("PROPTALK_AI_HISTORY_LIMIT", defaults.ai.history_limit),
        },
        storage: StorageConfig {
            database_url: var("PROPTALK_DATABASE_URL").unwrap_or(defaults.storage.database_url),
        },
        limits: LimitsConfig {
            telegram_per_minute: parsed(
                "PROPTALK_TELEGRAM_RATE_PER_MINUTE",
                defaults.limits.telegram_per_minute,
            ),
            whatsapp_per_minute: parsed(
                "PROPTALK_WHATSAPP_RATE_PER_MINUTE",
                defaults.limits.whatsapp_per_minute,
            ),
            outbound_per_minute: parsed(
                "PROPTALK_OUTBOUND_RATE_PER_MINUTE",
                defaults.limits.outbound_per_minute,
            ),
            max_delivery_attempts: parsed(
                "PROPTALK_MAX_DELIVERY_ATTEMPTS",
                defaults.limits.max_delivery_attempts,
            ),
            backoff_base_ms: parsed("PROPTALK_BACKOFF_BASE_MS", defaults.limits.backoff_base_ms),
        },
        sessions: SessionsConfig {
            idle_timeout_secs: parsed(
                "PROPTALK_SESSION_IDLE_TIMEOUT_SECS",
                defaults.sessions.idle_timeout_secs,
            ),
            sweep_interval_secs: parsed(
                "PROPTALK_SESSION_SWEEP_INTERVAL_SECS",
                defaults.sessions.sweep_interval_secs,
            ),
        },
    }
}
