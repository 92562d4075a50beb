//! Extracting session field values from free-form message text.
//!
//! Agents answer prompts either as `Label: value` lines (any subset, any
//! order) or, when exactly one field is still missing, as a bare value.

use std::collections::BTreeMap;

use proptalk_sessions::{DocumentSession, DocumentTemplate};

/// Pull field values out of `text` for the session's template.
///
/// `Label: value` lines match field names or labels case-insensitively,
/// with spaces and underscores interchangeable. A message without any
/// recognizable line fills the single missing field, if there is exactly one.
#[must_use]
pub fn extract(
    template: &DocumentTemplate,
    session: &DocumentSession,
    text: &str,
) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if let Some(spec) = lookup(template, key.trim()) {
            found.insert(spec.name.clone(), value.to_string());
        }
    }

    if found.is_empty()
        && session.missing.len() == 1
        && !text.trim().is_empty()
    {
        found.insert(session.missing[0].clone(), text.trim().to_string());
    }

    found
}

fn lookup<'a>(
    template: &'a DocumentTemplate,
    key: &str,
) -> Option<&'a proptalk_sessions::FieldSpec> {
    let normalized = normalize(key);
    template
        .fields
        .iter()
        .find(|f| normalize(&f.name) == normalized || normalize(&f.label) == normalized)
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            ' ' | '_' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        proptalk_sessions::{FieldRule, FieldSpec},
    };

    fn template() -> DocumentTemplate {
        DocumentTemplate {
            id: "t".into(),
            name: "T".into(),
            fields: vec![
                FieldSpec::new("client_name", "Client name", "", "", FieldRule::FreeText),
                FieldSpec::new("client_email", "Client email", "", "", FieldRule::Email),
            ],
        }
    }

    fn session(missing: &[&str]) -> DocumentSession {
        let mut s = DocumentSession::start("a", &template());
        s.missing = missing.iter().map(|m| (*m).to_string()).collect();
        s
    }

    #[test]
    fn labelled_lines_match_name_or_label() {
        let extracted = extract(
            &template(),
            &session(&["client_name", "client_email"]),
            "Client name: Maria Georgiou\nclient_email: maria@acme.com",
        );
        assert_eq!(extracted.get("client_name").map(String::as_str), Some("Maria Georgiou"));
        assert_eq!(extracted.get("client_email").map(String::as_str), Some("maria@acme.com"));
    }

    #[test]
    fn bare_value_fills_the_single_missing_field() {
        let extracted = extract(&template(), &session(&["client_email"]), "maria@acme.com");
        assert_eq!(extracted.get("client_email").map(String::as_str), Some("maria@acme.com"));
    }

    #[test]
    fn bare_value_with_several_missing_fields_extracts_nothing() {
        let extracted = extract(
            &template(),
            &session(&["client_name", "client_email"]),
            "Maria Georgiou",
        );
        assert!(extracted.is_empty());
    }

    #[test]
    fn unknown_labels_are_ignored() {
        let extracted = extract(
            &template(),
            &session(&["client_name", "client_email"]),
            "Budget: 250000\nClient name: Maria",
        );
        assert_eq!(extracted.len(), 1);
        assert!(extracted.contains_key("client_name"));
    }
}
