//! Shared types, error definitions, and utilities used across all proptalk crates.

pub mod email;
pub mod error;
pub mod types;

pub use {
    email::is_valid_email,
    error::{Error, Result},
    types::{InboundUpdate, Platform, now_epoch},
};
