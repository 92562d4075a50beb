//! HTTP entry point: webhook routes, the inbound gate (auth, throttle,
//! dedup), and the ack-then-process task handoff.

pub mod ai;
pub mod pipeline;
pub mod server;
pub mod state;
pub mod templates;

pub use {
    ai::OpenAiProvider,
    server::{build_app, serve, spawn_maintenance},
    state::AppState,
    templates::builtin_catalog,
};
