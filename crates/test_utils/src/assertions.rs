//! Custom Test Assertions
//!
//! Assertion helpers for CRM records and sync results that print the
//! offending record on failure.

use serde_json::Value;

use core_kernel::CrmId;
use domain_sync::{SyncResult, SyncStage};

/// Asserts the external ids stored on a CRM record, in order
pub fn assert_ext_ids(record: &Value, expected: &[&str]) {
    let actual: Vec<&str> = record
        .get("extIds")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    assert_eq!(actual, expected, "unexpected extIds on {}", record);
}

/// Asserts that a person record links to `company_id`
pub fn assert_linked_to(person: &Value, company_id: CrmId) {
    let linked = person
        .get("relationships")
        .and_then(Value::as_array)
        .map_or(false, |links| {
            links
                .iter()
                .any(|link| link["company"]["id"].as_i64() == Some(company_id.value()))
        });
    assert!(linked, "person {} is not linked to company {}", person, company_id);
}

/// Asserts a successful sync and returns the company id
pub fn assert_synced(result: &SyncResult) -> CrmId {
    assert!(
        result.success,
        "sync of form {} failed in {:?}: {:?}",
        result.form_id,
        result.failed_stage,
        result.error
    );
    match result.company_id {
        Some(id) => id,
        None => panic!("sync of form {} succeeded without a company id", result.form_id),
    }
}

/// Asserts a failed sync at `stage` whose error mentions `fragment`
pub fn assert_failed_at(result: &SyncResult, stage: SyncStage, fragment: &str) {
    assert!(!result.success, "sync of form {} unexpectedly succeeded", result.form_id);
    assert_eq!(result.failed_stage, Some(stage), "error: {:?}", result.error);
    let error = result.error.as_deref().unwrap_or_default();
    assert!(
        error.contains(fragment),
        "error {:?} does not mention {:?}",
        error,
        fragment
    );
}
