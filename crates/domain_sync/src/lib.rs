//! Sync Domain
//!
//! Orchestrates the synchronization of stored intake forms into the CRM:
//! payload normalization, company smart sync (or an administrator-chosen
//! target company), primary and additional contact persons with idempotent
//! company links, and persistence of the sync outcome on the form.
//!
//! The form store, the field-mapping store and the application log are
//! reached through the ports in [`ports`]; in-memory adapters are available
//! behind the `mock` feature.

pub mod config;
pub mod error;
pub mod form;
pub mod orchestrator;
pub mod payload;
pub mod ports;
pub mod result;
pub mod telemetry;

pub use config::SyncSettings;
pub use error::{StoreError, SyncError};
pub use form::{Attachments, FileAttachment, FormRecord, FormStatus, FormSyncStatus, SyncStatus};
pub use orchestrator::SyncOrchestrator;
pub use payload::build_sync_payload;
pub use ports::{
    FieldMappingStore, FormStore, LogEntry, LogLevel, SyncLogSink, TracingLogSink, SYNC_LOG_KIND,
};
pub use result::{
    BatchSyncSummary, ContactFailure, ContactSyncResult, MappingRecovery, SyncResult, SyncStage,
};
pub use telemetry::init_tracing;

#[cfg(any(test, feature = "mock"))]
pub use ports::mock::{InMemoryFormStore, InMemoryLogSink, InMemoryMappingStore};
