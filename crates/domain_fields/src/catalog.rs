//! Static field catalog of the intake form
//!
//! Two tables drive the mapper: `FIELD_DEFINITIONS` (label, type, step and
//! CRM group of every form field) and `AUTO_MAPPING` (where each form field
//! lands in the CRM). Both are plain data indexed once on first use.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Prefix shared by every CRM field group this application creates
pub const FIELD_GROUP_NAMESPACE: &str = "Webový formulář";

/// Custom-field data types of the CRM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Text,
    Decimal,
    Boolean,
    Date,
    Datetime,
    Enumeration,
    Hyperlink,
    Monetary,
    Percent,
    FileLinks,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Text => "TEXT",
            DataType::Decimal => "DECIMAL",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Datetime => "DATETIME",
            DataType::Enumeration => "ENUMERATION",
            DataType::Hyperlink => "HYPERLINK",
            DataType::Monetary => "MONETARY",
            DataType::Percent => "PERCENT",
            DataType::FileLinks => "FILE_LINKS",
        }
    }

    /// Numeric types, whose unparseable values are sent as `null`
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Decimal | DataType::Monetary | DataType::Percent)
    }

    /// Type to request from the CRM when provisioning a field
    ///
    /// The CRM rejects `MONETARY` custom fields created over the API, and
    /// `FILE_LINKS` is stored as multi-line text.
    pub fn provisioned_as(&self) -> DataType {
        match self {
            DataType::Monetary => DataType::Decimal,
            DataType::FileLinks => DataType::Text,
            other => *other,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CRM field groups owned by this application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldGroup {
    Company,
    Inquiry,
    Metadata,
}

impl FieldGroup {
    pub fn name(&self) -> &'static str {
        match self {
            FieldGroup::Company => "Webový formulář - Firma",
            FieldGroup::Inquiry => "Webový formulář - Poptávka",
            FieldGroup::Metadata => "Webový formulář - Metadata",
        }
    }
}

/// Where a form field lands in the CRM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingTarget {
    /// A native company field
    Native,
    /// The company address / contact-info structure
    Address,
    /// A linked person record
    Person,
    /// A provisioned custom field
    Custom,
    /// Not synchronized
    Skip,
}

/// Definition of one form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub key: &'static str,
    pub label: &'static str,
    pub data_type: DataType,
    /// Form step the field is asked in; 0 for generated metadata
    pub step: u8,
    pub group: FieldGroup,
    /// Option keys of enumeration fields, translated for the CRM
    pub options: &'static [&'static str],
}

/// Target classification of one form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoMappingRule {
    pub key: &'static str,
    pub target: MappingTarget,
}

const fn field(
    key: &'static str,
    label: &'static str,
    data_type: DataType,
    step: u8,
    group: FieldGroup,
) -> FieldDefinition {
    FieldDefinition {
        key,
        label,
        data_type,
        step,
        group,
        options: &[],
    }
}

const fn choice(
    key: &'static str,
    label: &'static str,
    step: u8,
    group: FieldGroup,
    options: &'static [&'static str],
) -> FieldDefinition {
    FieldDefinition {
        key,
        label,
        data_type: DataType::Enumeration,
        step,
        group,
        options,
    }
}

const fn rule(key: &'static str, target: MappingTarget) -> AutoMappingRule {
    AutoMappingRule { key, target }
}

use DataType as T;
use FieldGroup as G;

pub static FIELD_DEFINITIONS: &[FieldDefinition] = &[
    // step 1: company
    field("companyName", "Název firmy", T::String, 1, G::Company),
    field("ico", "IČO", T::String, 1, G::Company),
    field("dic", "DIČ", T::String, 1, G::Company),
    field("street", "Ulice", T::String, 1, G::Company),
    field("city", "Město", T::String, 1, G::Company),
    field("zip", "PSČ", T::String, 1, G::Company),
    field("country", "Země", T::String, 1, G::Company),
    field("companyEmail", "E-mail firmy", T::String, 1, G::Company),
    field("companyPhone", "Telefon firmy", T::String, 1, G::Company),
    field("website", "Web", T::Hyperlink, 1, G::Company),
    choice(
        "industry",
        "Obor podnikání",
        1,
        G::Company,
        &["construction", "manufacturing", "it", "retail", "services", "other"],
    ),
    choice(
        "employeeCount",
        "Počet zaměstnanců",
        1,
        G::Company,
        &["micro", "small", "medium", "large"],
    ),
    field("annualRevenue", "Roční obrat", T::Monetary, 1, G::Company),
    // step 2: contacts
    field("contactName", "Kontaktní osoba", T::String, 2, G::Company),
    field("contactFirstName", "Jméno kontaktní osoby", T::String, 2, G::Company),
    field("contactLastName", "Příjmení kontaktní osoby", T::String, 2, G::Company),
    field("contactEmail", "E-mail kontaktní osoby", T::String, 2, G::Company),
    field("contactPhone", "Telefon kontaktní osoby", T::String, 2, G::Company),
    field("contactPosition", "Pozice kontaktní osoby", T::String, 2, G::Company),
    field("additionalContacts", "Další kontaktní osoby", T::Text, 2, G::Company),
    // step 3: inquiry
    choice(
        "services",
        "Požadované služby",
        3,
        G::Inquiry,
        &["web", "eshop", "marketing", "seo", "consulting", "support"],
    ),
    field("budget", "Rozpočet", T::Decimal, 3, G::Inquiry),
    field("projectDescription", "Popis projektu", T::Text, 3, G::Inquiry),
    field("desiredStartDate", "Požadovaný termín zahájení", T::Date, 3, G::Inquiry),
    field("meetingAt", "Termín schůzky", T::Datetime, 3, G::Inquiry),
    choice(
        "preferredContactMethod",
        "Preferovaný způsob kontaktu",
        3,
        G::Inquiry,
        &["email", "phone", "meeting"],
    ),
    field("discountPercent", "Požadovaná sleva", T::Percent, 3, G::Inquiry),
    field("referenceUrl", "Reference", T::Hyperlink, 3, G::Inquiry),
    field("attachments", "Přílohy", T::FileLinks, 3, G::Inquiry),
    field("stepNotes", "Poznámky ke krokům", T::Text, 3, G::Inquiry),
    field("note", "Poznámka", T::Text, 3, G::Inquiry),
    // step 4: consents
    field("gdprConsent", "Souhlas se zpracováním údajů", T::Boolean, 4, G::Metadata),
    field("newsletterConsent", "Souhlas se zasíláním novinek", T::Boolean, 4, G::Metadata),
    // generated
    field("formId", "ID formuláře", T::String, 0, G::Metadata),
    field("submittedAt", "Datum odeslání", T::Datetime, 0, G::Metadata),
    field("adminUrl", "Odkaz do administrace", T::Hyperlink, 0, G::Metadata),
];

pub static AUTO_MAPPING: &[AutoMappingRule] = &[
    rule("companyName", MappingTarget::Native),
    rule("ico", MappingTarget::Native),
    rule("dic", MappingTarget::Native),
    rule("note", MappingTarget::Native),
    rule("street", MappingTarget::Address),
    rule("city", MappingTarget::Address),
    rule("zip", MappingTarget::Address),
    rule("country", MappingTarget::Address),
    rule("companyEmail", MappingTarget::Address),
    rule("companyPhone", MappingTarget::Address),
    rule("website", MappingTarget::Address),
    rule("contactName", MappingTarget::Person),
    rule("contactFirstName", MappingTarget::Person),
    rule("contactLastName", MappingTarget::Person),
    rule("contactEmail", MappingTarget::Person),
    rule("contactPhone", MappingTarget::Person),
    rule("contactPosition", MappingTarget::Person),
    rule("additionalContacts", MappingTarget::Person),
    rule("industry", MappingTarget::Custom),
    rule("employeeCount", MappingTarget::Custom),
    rule("annualRevenue", MappingTarget::Custom),
    rule("services", MappingTarget::Custom),
    rule("budget", MappingTarget::Custom),
    rule("projectDescription", MappingTarget::Custom),
    rule("desiredStartDate", MappingTarget::Custom),
    rule("meetingAt", MappingTarget::Custom),
    rule("preferredContactMethod", MappingTarget::Custom),
    rule("discountPercent", MappingTarget::Custom),
    rule("referenceUrl", MappingTarget::Custom),
    rule("attachments", MappingTarget::Custom),
    rule("stepNotes", MappingTarget::Custom),
    rule("gdprConsent", MappingTarget::Custom),
    rule("newsletterConsent", MappingTarget::Custom),
    rule("formId", MappingTarget::Custom),
    rule("submittedAt", MappingTarget::Custom),
    rule("adminUrl", MappingTarget::Custom),
    rule("currentStep", MappingTarget::Skip),
    rule("gdprToken", MappingTarget::Skip),
    rule("csrfToken", MappingTarget::Skip),
];

static DEFINITIONS_BY_KEY: Lazy<HashMap<&'static str, &'static FieldDefinition>> =
    Lazy::new(|| FIELD_DEFINITIONS.iter().map(|d| (d.key, d)).collect());

static TARGETS_BY_KEY: Lazy<HashMap<&'static str, MappingTarget>> =
    Lazy::new(|| AUTO_MAPPING.iter().map(|r| (r.key, r.target)).collect());

/// `stepNotes.1` is classified as `stepNotes`
fn root_key(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

/// Definition of a form field; dotted keys resolve to their root field
pub fn definition(key: &str) -> Option<&'static FieldDefinition> {
    DEFINITIONS_BY_KEY
        .get(key)
        .or_else(|| DEFINITIONS_BY_KEY.get(root_key(key)))
        .copied()
}

/// Target classification of a form field; unknown keys are skipped
pub fn target(key: &str) -> MappingTarget {
    TARGETS_BY_KEY
        .get(key)
        .or_else(|| TARGETS_BY_KEY.get(root_key(key)))
        .copied()
        .unwrap_or(MappingTarget::Skip)
}

/// Declared data type; fields without a definition are plain strings
pub fn data_type(key: &str) -> DataType {
    definition(key).map_or(DataType::String, |d| d.data_type)
}

/// Keys classified as custom fields, in catalog order
pub fn custom_field_keys() -> Vec<&'static str> {
    AUTO_MAPPING
        .iter()
        .filter(|r| r.target == MappingTarget::Custom)
        .map(|r| r.key)
        .collect()
}

/// Lowercases, trims and collapses whitespace; drops trailing `:` and `*`
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .trim_end_matches(|c| c == ':' || c == '*')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Custom-classified definition whose label matches `label`
pub fn definition_by_label(label: &str) -> Option<&'static FieldDefinition> {
    let wanted = normalize_label(label);
    FIELD_DEFINITIONS
        .iter()
        .find(|d| target(d.key) == MappingTarget::Custom && normalize_label(d.label) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_custom_key_has_a_definition() {
        for key in custom_field_keys() {
            assert!(definition(key).is_some(), "{} has no definition", key);
        }
    }

    #[test]
    fn test_keys_and_labels_are_unique() {
        let keys: HashSet<_> = FIELD_DEFINITIONS.iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), FIELD_DEFINITIONS.len());

        let labels: HashSet<_> = FIELD_DEFINITIONS.iter().map(|d| normalize_label(d.label)).collect();
        assert_eq!(labels.len(), FIELD_DEFINITIONS.len());
    }

    #[test]
    fn test_dotted_keys_fall_back_to_root() {
        assert_eq!(target("stepNotes.1"), MappingTarget::Custom);
        assert_eq!(data_type("stepNotes.1"), DataType::Text);
        assert_eq!(target("unknownField"), MappingTarget::Skip);
        assert_eq!(data_type("unknownField"), DataType::String);
    }

    #[test]
    fn test_groups_share_namespace() {
        for group in [FieldGroup::Company, FieldGroup::Inquiry, FieldGroup::Metadata] {
            assert!(group.name().starts_with(FIELD_GROUP_NAMESPACE));
        }
    }

    #[test]
    fn test_label_lookup_is_normalized() {
        assert_eq!(definition_by_label("  rozpočet: ").map(|d| d.key), Some("budget"));
        assert_eq!(definition_by_label("Název firmy"), None);
    }

    #[test]
    fn test_provisioned_types() {
        assert_eq!(DataType::Monetary.provisioned_as(), DataType::Decimal);
        assert_eq!(DataType::Date.provisioned_as(), DataType::Date);
    }
}
