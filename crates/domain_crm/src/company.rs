//! Company entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use core_kernel::{EntityKind, FormId};

use crate::contact::{Address, CompanyAddress, ContactInfo};
use crate::entity::CrmEntity;
use crate::phone::normalize_phone;
use crate::source::{keys, text};

/// Sales rating of a company
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    #[default]
    A,
    B,
    C,
}

/// Lifecycle state of a company in the sales pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanyState {
    #[default]
    #[serde(rename = "A_POTENTIAL")]
    Potential,
    #[serde(rename = "B_ACTUAL")]
    Actual,
    #[serde(rename = "C_DEFERRED")]
    Deferred,
    #[serde(rename = "D_UNATTRACTIVE")]
    Unattractive,
}

/// Business relationship to the company
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanyRole {
    #[default]
    #[serde(rename = "A_SUBSCRIBER")]
    Subscriber,
    #[serde(rename = "B_PARTNER")]
    Partner,
    #[serde(rename = "C_SUPPLIER")]
    Supplier,
    #[serde(rename = "D_RIVAL")]
    Rival,
}

/// Name given to the address built from the form
pub const PRIMARY_ADDRESS_NAME: &str = "Sídlo";

/// A company as written to the CRM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    /// Registration number (IČO)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reg_number: Option<String>,
    /// Tax number (DIČ)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_number: Option<String>,
    pub rating: Rating,
    pub state: CompanyState,
    pub role: CompanyRole,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<CompanyAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_fields: Map<String, Value>,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Registration numbers are compared without whitespace
pub fn normalize_ico(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

impl CrmEntity for Company {
    const KIND: EntityKind = EntityKind::Company;
    const ENDPOINT: &'static str = "company";
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "rating", "state", "role"];
    const EXT_ID_PREFIX: &'static str = "webform-company";
    const PRESERVED_ON_UPDATE: &'static [&'static str] = &["rating", "state", "role"];

    fn from_source(source: &Map<String, Value>, _form_id: FormId) -> Self {
        let address = Address {
            name: Some(PRIMARY_ADDRESS_NAME.to_string()),
            street: text(source, keys::STREET),
            city: text(source, keys::CITY),
            zip_code: text(source, keys::ZIP),
            country: text(source, keys::COUNTRY),
        };
        let contact_info = ContactInfo {
            email: text(source, keys::COMPANY_EMAIL),
            tel1: text(source, keys::COMPANY_PHONE).map(|p| normalize_phone(&p)),
            www: text(source, keys::WEBSITE),
        }
        .non_empty();

        let addresses = if address.is_empty() && contact_info.is_none() {
            Vec::new()
        } else {
            vec![CompanyAddress { address, contact_info }]
        };

        Company {
            name: text(source, keys::COMPANY_NAME).unwrap_or_default(),
            reg_number: text(source, keys::ICO).map(|ico| normalize_ico(&ico)),
            tax_number: text(source, keys::DIC).map(|dic| normalize_ico(&dic).to_uppercase()),
            addresses,
            notice: text(source, keys::NOTE),
            ..Default::default()
        }
    }

    fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
