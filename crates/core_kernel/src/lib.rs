//! Core Kernel - Foundational types shared by every crate of the CRM sync engine
//!
//! This crate provides the building blocks used across the domain modules:
//! - The `CrmError` taxonomy shared by the client, entity model and orchestrator
//! - Strongly-typed identifiers for CRM records, forms and sync runs
//! - An injectable clock so retry sleeps and cache expiry are testable
//! - The `CrmPort` seam between the domain crates and the HTTP client

pub mod clock;
pub mod error;
pub mod identifiers;
pub mod ports;

pub use clock::{Clock, MockClock, SystemClock};
pub use error::CrmError;
pub use identifiers::{CrmId, EntityKind, FormId, SyncRunId};
pub use ports::{
    AdapterHealth, CrmPort, DomainPort, HealthCheckResult, HealthCheckable, QueryParams,
    RateLimitSnapshot,
};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockCrm;
