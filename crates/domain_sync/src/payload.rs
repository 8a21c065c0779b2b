//! Normalization of the raw form payload before sync
//!
//! Multi-step forms store each step under `step1`, `step2`, ...; the entity
//! transforms and the custom-field mapper expect one flat level of form keys.

use serde_json::{json, Map, Value};

use domain_crm::is_empty_value;

use crate::form::{Attachments, FormRecord};

/// Injected metadata keys
pub mod meta {
    pub const FORM_ID: &str = "formId";
    pub const SUBMITTED_AT: &str = "submittedAt";
    pub const ADMIN_URL: &str = "adminUrl";
}

fn is_step_key(key: &str) -> bool {
    key.strip_prefix("step")
        .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Lifts `stepN` objects to the top level
///
/// A key already present at the top level with a non-empty value wins over a
/// step value; later steps win over earlier ones.
pub fn merge_steps(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();
    let mut step_keys: Vec<(u32, &Map<String, Value>)> = Vec::new();

    for (key, value) in raw {
        match value {
            Value::Object(step) if is_step_key(key) => {
                let n = key[4..].parse().unwrap_or(u32::MAX);
                step_keys.push((n, step));
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }

    step_keys.sort_by_key(|(n, _)| *n);
    let mut from_steps = Map::new();
    for (_, step) in step_keys {
        for (key, value) in step {
            from_steps.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in from_steps {
        if merged.get(&key).map_or(true, is_empty_value) {
            merged.insert(key, value);
        }
    }
    merged
}

/// Adds uploaded files under their field unless the payload already has a value there
pub fn merge_attachments(payload: &mut Map<String, Value>, attachments: &Attachments) {
    for (field, files) in attachments {
        if files.is_empty() || payload.get(field).map_or(false, |v| !is_empty_value(v)) {
            continue;
        }
        if let Ok(value) = serde_json::to_value(files) {
            payload.insert(field.clone(), value);
        }
    }
}

/// Link to the form's detail page in the admin
pub fn admin_url(admin_base_url: &str, record: &FormRecord) -> Option<String> {
    let base = admin_base_url.trim().trim_end_matches('/');
    (!base.is_empty()).then(|| format!("{}/forms/{}", base, record.id))
}

/// Flat payload handed to the entity transforms and the custom-field mapper
pub fn build_sync_payload(
    record: &FormRecord,
    attachments: &Attachments,
    admin_base_url: &str,
) -> Map<String, Value> {
    let mut payload = merge_steps(&record.payload);
    merge_attachments(&mut payload, attachments);

    payload.insert(meta::FORM_ID.to_string(), json!(record.id.value()));
    if let Some(submitted_at) = record.submitted_at {
        payload.insert(meta::SUBMITTED_AT.to_string(), json!(submitted_at.to_rfc3339()));
    }
    if let Some(url) = admin_url(admin_base_url, record) {
        payload.insert(meta::ADMIN_URL.to_string(), json!(url));
    }
    payload
}
