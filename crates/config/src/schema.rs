//! Config schema types (server, platforms, AI provider, storage, limits,
//! sessions).

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    pub whatsapp: WhatsAppConfig,
    pub ai: AiConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

/// Telegram Bot API credentials and webhook secret.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: Secret<String>,
    /// Value the `X-Telegram-Bot-Api-Secret-Token` header must carry.
    pub webhook_secret: Secret<String>,
    /// Bot API base URL; overridable for tests.
    pub api_base: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: Secret::new(String::new()),
            webhook_secret: Secret::new(String::new()),
            api_base: "https://api.telegram.org".into(),
        }
    }
}

/// Twilio-style WhatsApp provider credentials.
#[derive(Clone)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: Secret<String>,
    /// Sender number, `whatsapp:+...` form.
    pub from_number: String,
    pub api_base: String,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish_non_exhaustive()
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: Secret::new(String::new()),
            from_number: String::new(),
            api_base: "https://api.twilio.com".into(),
        }
    }
}

/// External AI completion provider.
#[derive(Clone)]
pub struct AiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    /// Hard timeout for one completion call; past it the call is abandoned
    /// and treated as a transient failure.
    pub timeout_secs: u64,
    /// How many recent conversation entries accompany a completion request.
    pub history_limit: u32,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            model: "gpt-4o-mini".into(),
            api_base: "https://api.openai.com/v1".into(),
            timeout_secs: 25,
            history_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx SQLite URL, e.g. `sqlite://proptalk.db?mode=rwc`.
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://proptalk.db?mode=rwc".into(),
        }
    }
}

/// Rate-limit caps. Inbound caps are per platform, reflecting each
/// platform's own limits; the outbound cap is distinct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub telegram_per_minute: usize,
    pub whatsapp_per_minute: usize,
    pub outbound_per_minute: usize,
    /// Maximum delivery attempts for transient failures.
    pub max_delivery_attempts: u32,
    /// Base backoff delay, doubled on each retry.
    pub backoff_base_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            telegram_per_minute: 20,
            whatsapp_per_minute: 10,
            outbound_per_minute: 30,
            max_delivery_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// A collecting session with no update for this long is swept to
    /// abandoned.
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 24 * 60 * 60,
            sweep_interval_secs: 10 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let cfg = TelegramConfig {
            bot_token: Secret::new("123:ABC".into()),
            ..Default::default()
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("123:ABC"));
        assert!(debug.contains("REDACTED"));
    }
}
