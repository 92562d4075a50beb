//! Field-level transforms applied when merging newly extracted values.

use std::collections::BTreeMap;

use regex::Regex;

use crate::model::{DocumentTemplate, FieldRule};

/// Listing URLs carry the property reference as their last path segment,
/// e.g. `https://acme.example/listings/AP-2214`.
const REFERENCE_SEGMENT: &str = r"^[A-Z]{2,4}-\d{1,6}$";

const LISTING_URL_FIELD: &str = "listing_url";
const PROPERTY_REFERENCE_FIELD: &str = "property_reference";

/// Apply per-field transforms to freshly extracted values, and infer fields
/// derivable from others. Returns the transformed map; the input order is
/// preserved by the `BTreeMap` key order.
#[must_use]
pub fn apply(template: &DocumentTemplate, new_fields: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    for (name, value) in new_fields {
        let value = match template.field(&name).map(|spec| &spec.rule) {
            Some(FieldRule::Phone { .. }) => mask_phone_middle(&value),
            _ => value.trim().to_string(),
        };
        out.insert(name, value);
    }

    // Infer the property reference from the listing URL when the template
    // wants one and it wasn't supplied explicitly.
    if template.field(PROPERTY_REFERENCE_FIELD).is_some()
        && !out.contains_key(PROPERTY_REFERENCE_FIELD)
        && let Some(url_value) = out.get(LISTING_URL_FIELD)
        && let Some(reference) = infer_reference_from_url(url_value)
    {
        out.insert(PROPERTY_REFERENCE_FIELD.to_string(), reference);
    }

    out
}

/// Hide the middle segment of a phone number: keep a short prefix and the
/// last two digits, mask the rest. Non-digit separators are dropped.
#[must_use]
pub fn mask_phone_middle(raw: &str) -> String {
    let plus = raw.trim().starts_with('+');
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 6 {
        // Too short to meaningfully mask; normalize only.
        return if plus { format!("+{digits}") } else { digits };
    }

    let prefix_len = 4.min(digits.len() - 2);
    let prefix = &digits[..prefix_len];
    let suffix = &digits[digits.len() - 2..];
    let masked = "*".repeat(digits.len() - prefix_len - 2);
    if plus {
        format!("+{prefix}{masked}{suffix}")
    } else {
        format!("{prefix}{masked}{suffix}")
    }
}

/// Pull a reference code out of a listing URL's last path segment.
#[must_use]
pub fn infer_reference_from_url(value: &str) -> Option<String> {
    let parsed = url::Url::parse(value.trim()).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let re = Regex::new(REFERENCE_SEGMENT).ok()?;
    re.is_match(segment).then(|| segment.to_string())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::model::{DocumentTemplate, FieldSpec},
    };

    fn template() -> DocumentTemplate {
        DocumentTemplate {
            id: "viewing".into(),
            name: "Viewing form".into(),
            fields: vec![
                FieldSpec::new("client_phone", "Phone", "", "+35799123456", FieldRule::Phone {
                    min_digits: 8,
                }),
                FieldSpec::new("listing_url", "Listing", "", "https://x.example/l/AP-1", FieldRule::Url),
                FieldSpec::new(
                    "property_reference",
                    "Reference",
                    "",
                    "AP-2214",
                    FieldRule::Regex {
                        pattern: REFERENCE_SEGMENT.into(),
                        message: "must look like AP-2214".into(),
                    },
                ),
            ],
        }
    }

    #[test]
    fn phone_middle_is_masked() {
        let masked = mask_phone_middle("+357 9912 3456");
        assert_eq!(masked, "+3579*****56");
    }

    #[test]
    fn short_phone_is_left_unmasked() {
        assert_eq!(mask_phone_middle("12345"), "12345");
    }

    #[test]
    fn reference_inferred_from_listing_url() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "listing_url".to_string(),
            "https://acme.example/listings/AP-2214".to_string(),
        );
        let out = apply(&template(), fields);
        assert_eq!(out.get("property_reference").map(String::as_str), Some("AP-2214"));
    }

    #[test]
    fn explicit_reference_wins_over_inference() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "listing_url".to_string(),
            "https://acme.example/listings/AP-2214".to_string(),
        );
        fields.insert("property_reference".to_string(), "VL-9".to_string());
        let out = apply(&template(), fields);
        assert_eq!(out.get("property_reference").map(String::as_str), Some("VL-9"));
    }

    #[test]
    fn non_reference_url_infers_nothing() {
        assert_eq!(infer_reference_from_url("https://acme.example/about"), None);
        assert_eq!(infer_reference_from_url("not a url"), None);
    }

    #[test]
    fn phone_transform_applies_during_merge() {
        let mut fields = BTreeMap::new();
        fields.insert("client_phone".to_string(), "+35799123456".to_string());
        let out = apply(&template(), fields);
        let phone = out.get("client_phone").cloned().unwrap_or_default();
        assert!(phone.contains('*'));
        assert!(phone.starts_with("+3579"));
    }
}
