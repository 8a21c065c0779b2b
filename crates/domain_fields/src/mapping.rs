//! Persisted association between form-field keys and CRM field names

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `formFieldKey → crmTechnicalFieldName`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, form_key: &str) -> Option<&str> {
        self.0.get(form_key).map(String::as_str)
    }

    pub fn contains(&self, form_key: &str) -> bool {
        self.0.contains_key(form_key)
    }

    pub fn insert(&mut self, form_key: impl Into<String>, crm_field: impl Into<String>) -> Option<String> {
        self.0.insert(form_key.into(), crm_field.into())
    }

    pub fn remove(&mut self, form_key: &str) -> Option<String> {
        self.0.remove(form_key)
    }

    /// Adds entries for keys not mapped yet; returns how many were added
    pub fn merge_missing(&mut self, other: &FieldMapping) -> usize {
        let mut added = 0;
        for (key, field) in other.iter() {
            if !self.contains(key) {
                self.insert(key, field);
                added += 1;
            }
        }
        added
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
