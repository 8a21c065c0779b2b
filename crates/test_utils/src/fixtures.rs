//! Pre-built Test Fixtures
//!
//! Form payloads and CRM records shaped like real submissions. Payloads are
//! JSON objects in the form store's raw (per-step) layout unless noted.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use domain_fields::FieldMapping;

/// Registration number shared by the company fixtures
pub const ALFA_ICO: &str = "12345678";

/// Form payload fixtures
pub struct FormFixtures;

impl FormFixtures {
    /// Company with a primary contact and an inquiry, split into steps
    pub fn complete() -> Map<String, Value> {
        COMPLETE_FORM.clone()
    }

    /// Company only, no contact person
    pub fn company_only() -> Map<String, Value> {
        object(json!({
            "step1": {
                "companyName": "Beta Služby a.s.",
                "ico": "87654321",
                "city": "Ostrava",
            }
        }))
    }

    /// Company with two additional contacts, the second one unnamed
    pub fn with_additional_contacts() -> Map<String, Value> {
        object(json!({
            "step1": { "companyName": "Gama Trade s.r.o." },
            "step2": {
                "contactName": "Eva Malá",
                "contactEmail": "eva.mala@gama.cz",
                "additionalContacts": [
                    { "name": "Petr Dvořák", "email": "petr@gama.cz", "position": "Nákup" },
                    { "email": "info@gama.cz" },
                ],
            }
        }))
    }

    /// Flat payload without a company name
    pub fn nameless() -> Map<String, Value> {
        object(json!({ "ico": "11223344", "contactName": "Karel Bezejmenný" }))
    }
}

static COMPLETE_FORM: Lazy<Map<String, Value>> = Lazy::new(|| {
    object(json!({
        "step1": {
            "companyName": "Alfa Stavby s.r.o.",
            "ico": ALFA_ICO,
            "dic": "CZ12345678",
            "street": "Dlouhá 12",
            "city": "Brno",
            "zip": "602 00",
            "industry": "construction",
            "employeeCount": "small",
        },
        "step2": {
            "contactName": "Ing. Jan Novák",
            "contactEmail": "Jan.Novak@alfa.cz",
            "contactPhone": "0603 123 456",
            "contactPosition": "Jednatel",
        },
        "step3": {
            "services": ["web", "seo"],
            "budget": "150 000",
            "desiredStartDate": "1.4.2024",
        },
        "step4": { "gdprConsent": "ano" },
    }))
});

/// CRM record fixtures for seeding `MockCrm`
pub struct CrmFixtures;

impl CrmFixtures {
    /// Company already in the CRM, imported from another system and advanced in the pipeline
    pub fn imported_company(ico: &str) -> Value {
        json!({
            "name": "Alfa Stavby",
            "regNumber": ico,
            "rating": "B",
            "state": "B_ACTUAL",
            "role": "A_SUBSCRIBER",
            "extIds": ["crm-import:77"],
        })
    }

    /// Person already in the CRM, looked up by email
    pub fn known_person(email: &str) -> Value {
        json!({
            "firstName": "Jan",
            "lastName": "Novák",
            "securityLevel": 1,
            "contactInfo": { "email": email },
        })
    }

    /// Custom field definition in the CRM's configuration shape
    pub fn custom_field(name: &str, label: &str, group: &str) -> Value {
        json!({ "name": name, "label": label, "groupName": group, "dataType": "STRING" })
    }
}

/// Field mapping fixtures
pub struct MappingFixtures;

impl MappingFixtures {
    /// Mapping for the inquiry fields of the complete form
    pub fn inquiry() -> FieldMapping {
        [
            ("services", "company_cf_services"),
            ("budget", "company_cf_budget"),
            ("desiredStartDate", "company_cf_start"),
            ("gdprConsent", "company_cf_gdpr"),
        ]
        .into_iter()
        .collect()
    }
}

/// Fixed timestamps
pub struct TemporalFixtures;

impl TemporalFixtures {
    pub fn submitted_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).single().unwrap_or_default()
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_form_has_all_steps() {
        let form = FormFixtures::complete();
        for step in ["step1", "step2", "step3", "step4"] {
            assert!(form[step].is_object(), "missing {}", step);
        }
    }
}
