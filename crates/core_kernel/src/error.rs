//! Error types shared by the CRM client, entity model and sync orchestrator
//!
//! A lookup that finds nothing is not an error anywhere in this system: the
//! client returns `None` for a 404 and the entity layer passes that through.

use thiserror::Error;

/// Errors raised while talking to the CRM or preparing data for it
#[derive(Debug, Error)]
pub enum CrmError {
    /// Credentials are missing or still set to the placeholder value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Required entity fields are missing or an input failed validation
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        missing_fields: Vec<String>,
    },

    /// The operation is not valid for the current entity state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The CRM kept throttling after all retries were spent
    #[error("Rate limited: remaining={remaining:?}, reset={reset:?}")]
    RateLimited {
        remaining: Option<u32>,
        reset: Option<u64>,
    },

    /// The CRM answered with a 4xx/5xx status other than 404 and 429
    #[error("CRM API error {status_code}: {message}")]
    Api { status_code: u16, message: String },

    /// The request never produced a response
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The request exceeded the configured timeout
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// A response or payload could not be converted
    #[error("Transformation error: {message}")]
    Transformation { message: String },
}

impl CrmError {
    /// Creates a Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        CrmError::Configuration(message.into())
    }

    /// Creates a Validation error without field information
    pub fn validation(message: impl Into<String>) -> Self {
        CrmError::Validation {
            message: message.into(),
            missing_fields: Vec::new(),
        }
    }

    /// Creates a Validation error naming the missing required fields
    pub fn validation_missing(entity: &str, missing_fields: Vec<String>) -> Self {
        CrmError::Validation {
            message: format!(
                "{} is missing required fields: {}",
                entity,
                missing_fields.join(", ")
            ),
            missing_fields,
        }
    }

    /// Creates an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        CrmError::InvalidState(message.into())
    }

    /// Creates an Api error
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        CrmError::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        CrmError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a Transformation error
    pub fn transformation(message: impl Into<String>) -> Self {
        CrmError::Transformation {
            message: message.into(),
        }
    }

    /// Returns true if retrying later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CrmError::Connection { .. } | CrmError::Timeout { .. } | CrmError::RateLimited { .. } => {
                true
            }
            CrmError::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Returns the missing field names of a Validation error
    pub fn missing_fields(&self) -> &[String] {
        match self {
            CrmError::Validation { missing_fields, .. } => missing_fields,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_missing_lists_fields() {
        let error = CrmError::validation_missing("Company", vec!["name".into(), "state".into()]);
        assert_eq!(error.missing_fields(), ["name".to_string(), "state".to_string()]);
        assert!(error.to_string().contains("name, state"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(CrmError::RateLimited { remaining: Some(0), reset: None }.is_transient());
        assert!(CrmError::api(503, "down").is_transient());
        assert!(!CrmError::api(400, "bad").is_transient());
        assert!(!CrmError::configuration("missing key").is_transient());
    }
}
