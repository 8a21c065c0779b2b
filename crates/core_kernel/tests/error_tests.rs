//! Tests for core_kernel error types

use core_kernel::CrmError;

#[test]
fn test_validation_error_carries_missing_fields() {
    let error = CrmError::validation_missing("Person", vec!["lastName".to_string()]);

    match &error {
        CrmError::Validation { missing_fields, message } => {
            assert_eq!(missing_fields, &vec!["lastName".to_string()]);
            assert!(message.contains("Person"));
        }
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_plain_validation_has_no_fields() {
    let error = CrmError::validation("label too short");
    assert!(error.missing_fields().is_empty());
    assert!(error.to_string().contains("label too short"));
}

#[test]
fn test_api_error_display() {
    let error = CrmError::api(422, "Invalid regNumber");
    let display = error.to_string();

    assert!(display.contains("422"));
    assert!(display.contains("Invalid regNumber"));
}

#[test]
fn test_rate_limited_display_includes_quota() {
    let error = CrmError::RateLimited {
        remaining: Some(0),
        reset: Some(60),
    };
    let display = error.to_string();

    assert!(display.contains("remaining=Some(0)"));
    assert!(display.contains("reset=Some(60)"));
}

#[test]
fn test_configuration_error() {
    let error = CrmError::configuration("API key is not set");

    match error {
        CrmError::Configuration(msg) => assert_eq!(msg, "API key is not set"),
        _ => panic!("Expected Configuration error"),
    }
}

#[test]
fn test_invalid_state_is_not_transient() {
    let error = CrmError::invalid_state("update requires an id");
    assert!(!error.is_transient());
}
