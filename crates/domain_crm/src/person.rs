//! Person (contact) entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use core_kernel::{EntityKind, FormId};

use crate::contact::ContactInfo;
use crate::entity::CrmEntity;
use crate::phone::normalize_phone;
use crate::source::{first_text, keys, text};

/// Security level assigned to persons created from the form
pub const DEFAULT_SECURITY_LEVEL: i64 = 1;

/// A contact person as written to the CRM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub last_name: String,
    pub security_level: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<ContactInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl Default for Person {
    fn default() -> Self {
        Self {
            title_before: None,
            first_name: None,
            last_name: String::new(),
            security_level: DEFAULT_SECURITY_LEVEL,
            contact_info: None,
            notice: None,
        }
    }
}

/// Parts of a free-form personal name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub title_before: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Splits `"Ing. Jan Novák"` into title, first and last name
///
/// Leading tokens ending with `.` are academic titles; the final token is the
/// last name and everything between is the first name.
pub fn split_name(full: &str) -> NameParts {
    let tokens: Vec<&str> = full.split_whitespace().collect();
    let titles = tokens
        .iter()
        .take_while(|t| t.ends_with('.') && t.len() > 1)
        .count()
        .min(tokens.len().saturating_sub(1));
    let (title, rest) = tokens.split_at(titles);

    let join = |parts: &[&str]| (!parts.is_empty()).then(|| parts.join(" "));
    match rest.split_last() {
        Some((last, first)) => NameParts {
            title_before: join(title),
            first_name: join(first),
            last_name: Some(last.to_string()),
        },
        None => NameParts::default(),
    }
}

impl Person {
    fn build(
        full_name: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Self {
        let split = full_name.as_deref().map(split_name).unwrap_or_default();
        let contact_info = ContactInfo {
            email: email.map(|e| e.to_lowercase()),
            tel1: phone.map(|p| normalize_phone(&p)),
            www: None,
        }
        .non_empty();

        Person {
            title_before: split.title_before,
            first_name: first_name.or(split.first_name),
            last_name: last_name.or(split.last_name).unwrap_or_default(),
            contact_info,
            ..Default::default()
        }
    }

    /// Builds a person from one entry of the additional-contacts list
    ///
    /// Entries use the short keys `name`, `firstName`, `lastName`, `email`,
    /// `phone`.
    pub fn from_contact_entry(entry: &Map<String, Value>) -> Self {
        Self::build(
            text(entry, "name"),
            text(entry, "firstName"),
            text(entry, "lastName"),
            text(entry, "email"),
            text(entry, "phone"),
        )
    }

    /// True when the form names a primary contact person
    pub fn has_primary_contact(source: &Map<String, Value>) -> bool {
        first_text(
            source,
            &[keys::CONTACT_NAME, keys::CONTACT_FIRST_NAME, keys::CONTACT_LAST_NAME],
        )
        .is_some()
    }

    pub fn email(&self) -> Option<&str> {
        self.contact_info.as_ref().and_then(|c| c.email.as_deref())
    }

    pub fn phone(&self) -> Option<&str> {
        self.contact_info.as_ref().and_then(|c| c.tel1.as_deref())
    }
}

impl CrmEntity for Person {
    const KIND: EntityKind = EntityKind::Person;
    const ENDPOINT: &'static str = "person";
    const REQUIRED_FIELDS: &'static [&'static str] = &["lastName", "securityLevel"];
    const EXT_ID_PREFIX: &'static str = "webform-person";

    fn from_source(source: &Map<String, Value>, _form_id: FormId) -> Self {
        Self::build(
            text(source, keys::CONTACT_NAME),
            text(source, keys::CONTACT_FIRST_NAME),
            text(source, keys::CONTACT_LAST_NAME),
            text(source, keys::CONTACT_EMAIL),
            text(source, keys::CONTACT_PHONE),
        )
    }

    fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// External id of the `index`-th (1-based) additional contact of a form
pub fn additional_contact_external_id(form_id: FormId, index: usize) -> String {
    format!("{}-{}", Person::external_id_for(form_id), index)
}
