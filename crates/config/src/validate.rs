//! Named, field-specific configuration diagnostics.

use secrecy::ExposeSecret;

use crate::schema::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One finding about the loaded configuration.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub field: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn error(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            field,
            message: message.into(),
        }
    }

    fn warning(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field,
            message: message.into(),
        }
    }
}

/// Check the configuration; errors mean the gateway cannot serve that
/// platform, warnings are degraded-but-runnable.
#[must_use]
pub fn validate(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.telegram.bot_token.expose_secret().is_empty() {
        diagnostics.push(Diagnostic::error(
            "telegram.bot_token",
            "PROPTALK_TELEGRAM_BOT_TOKEN is not set",
        ));
    }
    if config.telegram.webhook_secret.expose_secret().is_empty() {
        diagnostics.push(Diagnostic::error(
            "telegram.webhook_secret",
            "PROPTALK_TELEGRAM_WEBHOOK_SECRET is not set; telegram webhooks would be unauthenticated",
        ));
    }
    if config.whatsapp.account_sid.is_empty() {
        diagnostics.push(Diagnostic::error(
            "whatsapp.account_sid",
            "PROPTALK_WHATSAPP_ACCOUNT_SID is not set",
        ));
    }
    if config.whatsapp.auth_token.expose_secret().is_empty() {
        diagnostics.push(Diagnostic::error(
            "whatsapp.auth_token",
            "PROPTALK_WHATSAPP_AUTH_TOKEN is not set",
        ));
    }
    if config.whatsapp.from_number.is_empty() {
        diagnostics.push(Diagnostic::error(
            "whatsapp.from_number",
            "PROPTALK_WHATSAPP_FROM is not set",
        ));
    }
    if config.ai.api_key.expose_secret().is_empty() {
        diagnostics.push(Diagnostic::warning(
            "ai.api_key",
            "PROPTALK_AI_API_KEY is not set; free-form questions will get the fallback reply",
        ));
    }
    if config.limits.max_delivery_attempts == 0 {
        diagnostics.push(Diagnostic::error(
            "limits.max_delivery_attempts",
            "must be at least 1",
        ));
    }
    if config.limits.telegram_per_minute == 0 || config.limits.whatsapp_per_minute == 0 {
        diagnostics.push(Diagnostic::warning(
            "limits",
            "an inbound cap of 0 rejects every message on that platform",
        ));
    }
    if config.limits.outbound_per_minute == 0 {
        diagnostics.push(Diagnostic::error(
            "limits.outbound_per_minute",
            "must be at least 1; an outbound cap of 0 can never pace a send",
        ));
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use {super::*, crate::schema::TelegramConfig, secrecy::Secret};

    #[test]
    fn default_config_is_missing_credentials() {
        let diagnostics = validate(&Config::default());
        assert!(
            diagnostics
                .iter()
                .any(|d| d.field == "telegram.bot_token" && d.severity == Severity::Error)
        );
    }

    #[test]
    fn missing_ai_key_is_only_a_warning() {
        let diagnostics = validate(&Config::default());
        let ai = diagnostics.iter().find(|d| d.field == "ai.api_key");
        assert!(ai.is_some_and(|d| d.severity == Severity::Warning));
    }

    #[test]
    fn zero_delivery_attempts_is_an_error() {
        let mut config = Config {
            telegram: TelegramConfig {
                bot_token: Secret::new("t".into()),
                webhook_secret: Secret::new("s".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        config.limits.max_delivery_attempts = 0;
        assert!(
            validate(&config)
                .iter()
                .any(|d| d.field == "limits.max_delivery_attempts")
        );
    }

    #[test]
    fn zero_outbound_cap_is_an_error() {
        let mut config = Config::default();
        config.limits.outbound_per_minute = 0;
        let diagnostics = validate(&config);
        let cap = diagnostics
            .iter()
            .find(|d| d.field == "limits.outbound_per_minute");
        assert!(cap.is_some_and(|d| d.severity == Severity::Error));
    }
}
