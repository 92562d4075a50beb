//! Multi-turn document-collection sessions.
//!
//! A session tracks one agent filling in one document template's fields over
//! several messages: `collecting → validating → complete → generating → sent`,
//! with `abandoned` reachable from the pre-complete states via cancel,
//! supersede, or the idle sweep.

pub mod manager;
pub mod model;
pub mod transform;
pub mod validate;

pub use {
    manager::{SessionManager, UpdateOutcome},
    model::{
        DocumentSession, DocumentTemplate, Error, FieldRule, FieldSpec, Result, SessionStatus,
        SessionStore, TemplateCatalog,
    },
    validate::FieldError,
};
