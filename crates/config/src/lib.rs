//! Environment-driven configuration: schema, loading, validation.
//!
//! Every setting comes from the process environment (`PROPTALK_*` variables);
//! secrets are wrapped in [`secrecy::Secret`] and never appear in `Debug`
//! output or logs.

pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::from_env,
    schema::{
        AiConfig, Config, LimitsConfig, ServerConfig, SessionsConfig, StorageConfig,
        TelegramConfig, WhatsAppConfig,
    },
    validate::{Diagnostic, Severity, validate},
};
