//! Field-type-driven validation.
//!
//! Every failure names the offending field and says what a good value looks
//! like; a session update never produces one opaque "invalid input".

use regex::Regex;

use crate::model::{FieldRule, FieldSpec};

/// Human-readable validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub label: String,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label, self.message)
    }
}

/// Validate one collected value against its field spec.
#[must_use]
pub fn validate_field(spec: &FieldSpec, value: &str) -> Option<FieldError> {
    let trimmed = value.trim();
    let failure = |message: String| {
        Some(FieldError {
            field: spec.name.clone(),
            label: spec.label.clone(),
            message,
        })
    };

    match &spec.rule {
        FieldRule::FreeText => {
            if trimmed.is_empty() {
                return failure("must not be empty".into());
            }
        },
        FieldRule::Email => {
            if !proptalk_common::is_valid_email(trimmed) {
                return failure(format!(
                    "'{trimmed}' is not a valid email address (e.g. {})",
                    spec.example
                ));
            }
        },
        FieldRule::Url => {
            if url::Url::parse(trimmed).is_err() {
                return failure(format!("'{trimmed}' is not a valid URL (e.g. {})", spec.example));
            }
        },
        FieldRule::Phone { min_digits } => {
            // `*` counts as a digit: stored phone values arrive already
            // masked by the merge transform.
            let digits = trimmed
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '*')
                .count();
            if digits < *min_digits {
                return failure(format!(
                    "needs at least {min_digits} digits (e.g. {})",
                    spec.example
                ));
            }
        },
        FieldRule::Regex { pattern, message } => match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(trimmed) {
                    return failure(message.clone());
                }
            },
            // A broken pattern is a template-authoring bug; fail the value
            // with the template's own message rather than panicking.
            Err(_) => return failure(message.clone()),
        },
        FieldRule::Length { min, max } => {
            let len = trimmed.chars().count();
            if len < *min || len > *max {
                return failure(format!("must be between {min} and {max} characters"));
            }
        },
    }

    None
}
