//! Forward-command detection and validation.
//!
//! Two textual patterns, case-insensitive:
//! `forward to <phone>: <text>` and `/forward <phone> <text>`.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static NATURAL_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*forward\s+to\s+([^:]*?)\s*:\s*(.*)$").expect("static pattern")
});

#[allow(clippy::expect_used)]
static SLASH_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*/forward(?:\s+(\S+))?(?:\s+(.*))?$").expect("static pattern")
});

/// A validated forward instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardCommand {
    /// Normalized recipient: `+` (if given) plus digits only.
    pub phone: String,
    pub body: String,
}

/// Outcome of scanning one message for a forward command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardParse {
    /// The message is not a forward command at all.
    NotAForward,
    /// The message tried to be a forward command but cannot be executed;
    /// the string is the user-facing correction.
    Invalid(String),
    Command(ForwardCommand),
}

const MIN_PHONE_DIGITS: usize = 8;

/// Scan `text` for either forward pattern.
#[must_use]
pub fn parse(text: &str) -> ForwardParse {
    if let Some(caps) = SLASH_FORM.captures(text) {
        let phone = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        return validate(phone, body);
    }
    if let Some(caps) = NATURAL_FORM.captures(text) {
        let phone = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let body = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
        return validate(phone, body);
    }
    ForwardParse::NotAForward
}

fn validate(raw_phone: &str, body: &str) -> ForwardParse {
    let Some(phone) = normalize_phone(raw_phone) else {
        return ForwardParse::Invalid(format!(
            "That phone number doesn't look right. Use an international number with at least \
             {MIN_PHONE_DIGITS} digits, e.g. forward to +35799123456: your message"
        ));
    };
    if body.is_empty() {
        return ForwardParse::Invalid(
            "The forward is missing a message. Use: forward to +35799123456: your message".into(),
        );
    }
    ForwardParse::Command(ForwardCommand {
        phone,
        body: body.to_string(),
    })
}

/// Strip separators and check the digit count. Returns the normalized number
/// (optional `+` followed by digits) or `None` when it is not a phone number.
fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (plus, rest) = match trimmed.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", trimmed),
    };

    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !matches!(c, ' ' | '-' | '(' | ')' | '.') {
            return None;
        }
    }
    if digits.len() < MIN_PHONE_DIGITS {
        return None;
    }
    Some(format!("{plus}{digits}"))
}
