//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! CRM sync engine test suite.
//!
//! # Modules
//!
//! - `fixtures`: Form payloads and CRM records used across tests
//! - `builders`: Builder for stored form records
//! - `harness`: A sync orchestrator wired to the in-memory CRM and stores
//! - `assertions`: Assertion helpers for CRM records and sync results
//! - `generators`: Property-based test data generators

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod generators;
pub mod harness;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use generators::*;
pub use harness::*;
