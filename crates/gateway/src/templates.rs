//! In-process document-template catalog.
//!
//! The real template catalog (and the document text itself) lives outside
//! this service; the pipeline only needs ids and field lists. These built-in
//! definitions cover the standard agency paperwork.

use proptalk_sessions::{DocumentTemplate, FieldRule, FieldSpec, TemplateCatalog};

/// Static catalog over a fixed template list.
pub struct StaticCatalog {
    templates: Vec<DocumentTemplate>,
}

impl TemplateCatalog for StaticCatalog {
    fn get(&self, template_id: &str) -> Option<&DocumentTemplate> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    fn list(&self) -> Vec<&DocumentTemplate> {
        self.templates.iter().collect()
    }
}

/// The built-in agency templates.
#[must_use]
pub fn builtin_catalog() -> StaticCatalog {
    StaticCatalog {
        templates: vec![reservation_form(), viewing_form()],
    }
}

fn reservation_form() -> DocumentTemplate {
    DocumentTemplate {
        id: "reservation".into(),
        name: "reservation form".into(),
        fields: vec![
            FieldSpec::new(
                "client_name",
                "Client name",
                "the buyer's full legal name",
                "Andreas Georgiou",
                FieldRule::Length { min: 2, max: 120 },
            ),
            FieldSpec::new(
                "client_email",
                "Client email",
                "where the signed copy goes",
                "andreas@example.com",
                FieldRule::Email,
            ),
            FieldSpec::new(
                "client_phone",
                "Client phone",
                "international format",
                "+357 99 123456",
                FieldRule::Phone { min_digits: 8 },
            ),
            FieldSpec::new(
                "listing_url",
                "Listing URL",
                "link to the property listing",
                "https://listings.example.com/p/AP-2214",
                FieldRule::Url,
            ),
            FieldSpec::new(
                "property_reference",
                "Property reference",
                "the listing reference code",
                "AP-2214",
                FieldRule::Regex {
                    pattern: r"^[A-Z]{2,4}-\d{1,6}$".into(),
                    message: "must be a reference code like AP-2214".into(),
                },
            ),
            FieldSpec::new(
                "reservation_amount",
                "Reservation amount",
                "deposit in euros",
                "5000",
                FieldRule::Regex {
                    pattern: r"^\d+(\.\d{1,2})?$".into(),
                    message: "must be an amount in euros, e.g. 5000".into(),
                },
            ),
        ],
    }
}

fn viewing_form() -> DocumentTemplate {
    DocumentTemplate {
        id: "viewing".into(),
        name: "viewing confirmation".into(),
        fields: vec![
            FieldSpec::new(
                "client_name",
                "Client name",
                "who is attending the viewing",
                "Andreas Georgiou",
                FieldRule::Length { min: 2, max: 120 },
            ),
            FieldSpec::new(
                "client_phone",
                "Client phone",
                "international format",
                "+357 99 123456",
                FieldRule::Phone { min_digits: 8 },
            ),
            FieldSpec::new(
                "property_reference",
                "Property reference",
                "the listing reference code",
                "AP-2214",
                FieldRule::Regex {
                    pattern: r"^[A-Z]{2,4}-\d{1,6}$".into(),
                    message: "must be a reference code like AP-2214".into(),
                },
            ),
            FieldSpec::new(
                "viewing_time",
                "Viewing time",
                "date and time of the appointment",
                "2026-09-03 15:00",
                FieldRule::Length { min: 4, max: 40 },
            ),
            FieldSpec::new(
                "notes",
                "Notes",
                "anything the office should know",
                "client prefers English",
                FieldRule::FreeText,
            )
            .optional(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_resolve_by_id() {
        let catalog = builtin_catalog();
        assert!(catalog.get("reservation").is_some());
        assert!(catalog.get("viewing").is_some());
        assert!(catalog.get("lease").is_none());
        assert_eq!(catalog.list().len(), 2);
    }

    #[test]
    fn optional_fields_are_not_required() {
        let catalog = builtin_catalog();
        let viewing = catalog.get("viewing").map(DocumentTemplate::required_fields);
        assert!(viewing.is_some_and(|required| !required.contains(&"notes".to_string())));
    }
}
