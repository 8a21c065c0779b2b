//! Form payload keys read by the native entity transforms

use serde_json::{Map, Value};

/// Keys of the intake form payload that map onto native CRM fields
pub mod keys {
    pub const COMPANY_NAME: &str = "companyName";
    pub const ICO: &str = "ico";
    pub const DIC: &str = "dic";
    pub const NOTE: &str = "note";

    pub const STREET: &str = "street";
    pub const CITY: &str = "city";
    pub const ZIP: &str = "zip";
    pub const COUNTRY: &str = "country";
    pub const COMPANY_EMAIL: &str = "companyEmail";
    pub const COMPANY_PHONE: &str = "companyPhone";
    pub const WEBSITE: &str = "website";

    pub const CONTACT_NAME: &str = "contactName";
    pub const CONTACT_FIRST_NAME: &str = "contactFirstName";
    pub const CONTACT_LAST_NAME: &str = "contactLastName";
    pub const CONTACT_EMAIL: &str = "contactEmail";
    pub const CONTACT_PHONE: &str = "contactPhone";
    pub const CONTACT_POSITION: &str = "contactPosition";
    pub const ADDITIONAL_CONTACTS: &str = "additionalContacts";
}

/// Reads a trimmed, non-empty text value; numbers are stringified
pub fn text(source: &Map<String, Value>, key: &str) -> Option<String> {
    match source.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads the first present key
pub fn first_text(source: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(source, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_trims_and_stringifies() {
        let source = json!({ "a": "  x ", "b": "   ", "c": 12345678, "d": null, "e": ["x"] });
        let source = source.as_object().unwrap();
        assert_eq!(text(source, "a").as_deref(), Some("x"));
        assert_eq!(text(source, "b"), None);
        assert_eq!(text(source, "c").as_deref(), Some("12345678"));
        assert_eq!(text(source, "d"), None);
        assert_eq!(text(source, "e"), None);
        assert_eq!(first_text(source, &["b", "missing", "a"]).as_deref(), Some("x"));
    }
}
