//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating form data in the shapes
//! visitors actually type in.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// Eight-digit registration number, optionally spaced as `123 45 678`
pub fn ico_strategy() -> impl Strategy<Value = (String, String)> {
    ("[0-9]{8}", any::<bool>()).prop_map(|(digits, spaced)| {
        let typed = if spaced {
            format!("{} {} {}", &digits[..3], &digits[3..5], &digits[5..])
        } else {
            digits.clone()
        };
        (digits, typed)
    })
}

/// Domestic phone number `0` + 9 digits with random separators, and its digits
pub fn domestic_phone_strategy() -> impl Strategy<Value = (String, String)> {
    (
        "[1-9][0-9]{8}",
        prop::sample::select(vec!["", " ", "-", "/", "."]),
    )
        .prop_map(|(digits, sep)| {
            let typed = format!("0{}{}{}{}{}", &digits[..2], sep, &digits[2..5], sep, &digits[5..]);
            (digits, typed)
        })
}

/// Company name with a legal-form suffix
pub fn company_name_strategy() -> impl Strategy<Value = String> {
    (
        "[A-Z][a-z]{2,10}",
        prop::sample::select(vec!["s.r.o.", "a.s.", "v.o.s.", ""]),
    )
        .prop_map(|(stem, suffix)| format!("{} {}", stem, suffix).trim().to_string())
}

/// Person name, optionally with a leading academic title
pub fn person_name_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["", "Ing. ", "Mgr. ", "MUDr. "]),
        "[A-Z][a-z]{2,8}",
        "[A-Z][a-z]{2,10}",
    )
        .prop_map(|(title, first, last)| format!("{}{} {}", title, first, last))
}

/// Flat form payload with a company and a primary contact
pub fn form_payload_strategy() -> impl Strategy<Value = Map<String, Value>> {
    (company_name_strategy(), ico_strategy(), person_name_strategy(), "[a-z]{3,8}").prop_map(
        |(company, (_, ico), contact, mailbox)| {
            let payload = json!({
                "companyName": company,
                "ico": ico,
                "contactName": contact,
                "contactEmail": format!("{}@example.cz", mailbox),
            });
            match payload {
                Value::Object(map) => map,
                _ => Map::new(),
            }
        },
    )
}
