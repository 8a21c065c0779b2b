//! CRM infrastructure adapter
//!
//! Implements `core_kernel::CrmPort` over the CRM's REST API using reqwest.
//!
//! # Error Handling
//!
//! Responses are classified as follows:
//! - 2xx -> body
//! - 404 -> `None` for reads, `false` for deletes, `CrmError::Api` for writes
//! - 429 -> sleep `retry_delay`, retry up to `retry_attempts`, then `CrmError::RateLimited`
//! - other 4xx/5xx -> `CrmError::Api` with the message parsed from the body
//! - timeouts / transport failures -> `CrmError::Timeout` / `CrmError::Connection`

pub mod client;
pub mod config;

pub use crate::client::CrmClient;
pub use crate::config::{CrmConfig, DEFAULT_BASE_URL, PLACEHOLDER_API_KEY};
