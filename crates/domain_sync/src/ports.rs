//! Sync Collaborator Ports
//!
//! The orchestrator reads forms, persists sync status, loads the field
//! mapping and writes log entries through the traits in this module. The
//! hosting application supplies database-backed adapters; the `mock` module
//! provides in-memory ones for tests.
//!
//! ```text
//!   SyncOrchestrator ──► FormStore          (forms + sync status + attachments)
//!                    ──► FieldMappingStore  (form key → CRM field name)
//!                    ──► SyncLogSink        (append-only log entries)
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use core_kernel::{DomainPort, FormId};
use domain_fields::FieldMapping;

use crate::error::StoreError;
use crate::form::{Attachments, FormRecord, SyncStatus};

/// Access to stored intake forms
#[async_trait]
pub trait FormStore: DomainPort {
    async fn get(&self, id: FormId) -> Result<Option<FormRecord>, StoreError>;

    /// Submitted forms without a successful sync, oldest first
    async fn list_pending(&self, limit: usize) -> Result<Vec<FormRecord>, StoreError>;

    /// Overwrites the sync bookkeeping of a form
    async fn update_sync_status(&self, id: FormId, status: &SyncStatus) -> Result<(), StoreError>;

    /// Forgets any previous sync of a form
    async fn clear_sync_status(&self, id: FormId) -> Result<(), StoreError> {
        self.update_sync_status(id, &SyncStatus::default()).await
    }

    /// Uploaded files of a form, keyed by form field
    async fn attachments(&self, id: FormId) -> Result<Attachments, StoreError>;
}

/// Persistence of the form-key to CRM-field mapping
#[async_trait]
pub trait FieldMappingStore: DomainPort {
    async fn load(&self) -> Result<FieldMapping, StoreError>;

    async fn save(&self, mapping: &FieldMapping) -> Result<(), StoreError>;
}

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("info"),
            LogLevel::Warning => f.write_str("warning"),
            LogLevel::Error => f.write_str("error"),
        }
    }
}

/// Entry kind used for everything the orchestrator logs
pub const SYNC_LOG_KIND: &str = "crm_sync";

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: LogLevel,
    pub message: String,
    pub context: Value,
}

impl LogEntry {
    pub fn sync(level: LogLevel, message: impl Into<String>, context: Value) -> Self {
        Self {
            kind: SYNC_LOG_KIND.to_string(),
            level,
            message: message.into(),
            context,
        }
    }
}

/// Append-only application log
///
/// The sync flow never depends on an append succeeding.
#[async_trait]
pub trait SyncLogSink: DomainPort {
    async fn append(&self, entry: LogEntry) -> Result<(), StoreError>;
}

/// Sink that forwards entries to `tracing` only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl DomainPort for TracingLogSink {}

#[async_trait]
impl SyncLogSink for TracingLogSink {
    async fn append(&self, entry: LogEntry) -> Result<(), StoreError> {
        match entry.level {
            LogLevel::Info => tracing::info!(kind = %entry.kind, context = %entry.context, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(kind = %entry.kind, context = %entry.context, "{}", entry.message),
            LogLevel::Error => tracing::error!(kind = %entry.kind, context = %entry.context, "{}", entry.message),
        }
        Ok(())
    }
}

/// In-memory adapters for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    /// Form store backed by a map
    #[derive(Debug, Default)]
    pub struct InMemoryFormStore {
        forms: RwLock<BTreeMap<FormId, FormRecord>>,
        attachments: RwLock<BTreeMap<FormId, Attachments>>,
        fail_writes: AtomicBool,
    }

    impl InMemoryFormStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn insert(&self, record: FormRecord) {
            self.forms.write().await.insert(record.id, record);
        }

        pub async fn form(&self, id: FormId) -> Option<FormRecord> {
            self.forms.read().await.get(&id).cloned()
        }

        pub async fn set_attachments(&self, id: FormId, attachments: Attachments) {
            self.attachments.write().await.insert(id, attachments);
        }

        /// Makes every subsequent status write fail
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    impl DomainPort for InMemoryFormStore {}

    #[async_trait]
    impl FormStore for InMemoryFormStore {
        async fn get(&self, id: FormId) -> Result<Option<FormRecord>, StoreError> {
            Ok(self.form(id).await)
        }

        async fn list_pending(&self, limit: usize) -> Result<Vec<FormRecord>, StoreError> {
            let mut pending: Vec<FormRecord> = self
                .forms
                .read()
                .await
                .values()
                .filter(|record| record.is_pending())
                .cloned()
                .collect();
            pending.sort_by_key(|record| (record.submitted_at, record.id));
            pending.truncate(limit);
            Ok(pending)
        }

        async fn update_sync_status(&self, id: FormId, status: &SyncStatus) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("form store is read-only".to_string()));
            }
            let mut forms = self.forms.write().await;
            let record = forms
                .get_mut(&id)
                .ok_or_else(|| StoreError::Unavailable(format!("form {} does not exist", id)))?;
            record.sync = status.clone();
            Ok(())
        }

        async fn attachments(&self, id: FormId) -> Result<Attachments, StoreError> {
            Ok(self.attachments.read().await.get(&id).cloned().unwrap_or_default())
        }
    }

    /// Field mapping held in memory
    #[derive(Debug, Default)]
    pub struct InMemoryMappingStore {
        mapping: RwLock<FieldMapping>,
        saves: AtomicUsize,
    }

    impl InMemoryMappingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_mapping(mapping: FieldMapping) -> Self {
            Self {
                mapping: RwLock::new(mapping),
                saves: AtomicUsize::new(0),
            }
        }

        pub async fn mapping(&self) -> FieldMapping {
            self.mapping.read().await.clone()
        }

        /// Number of `save` calls so far
        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl DomainPort for InMemoryMappingStore {}

    #[async_trait]
    impl FieldMappingStore for InMemoryMappingStore {
        async fn load(&self) -> Result<FieldMapping, StoreError> {
            Ok(self.mapping().await)
        }

        async fn save(&self, mapping: &FieldMapping) -> Result<(), StoreError> {
            *self.mapping.write().await = mapping.clone();
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Log sink that keeps entries, or rejects all of them
    #[derive(Debug, Default)]
    pub struct InMemoryLogSink {
        entries: RwLock<Vec<LogEntry>>,
        failing: bool,
    }

    impl InMemoryLogSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// A sink whose every append fails
        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        pub async fn entries(&self) -> Vec<LogEntry> {
            self.entries.read().await.clone()
        }

        pub async fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
            self.entries
                .read()
                .await
                .iter()
                .filter(|entry| entry.level == level)
                .cloned()
                .collect()
        }
    }

    impl DomainPort for InMemoryLogSink {}

    #[async_trait]
    impl SyncLogSink for InMemoryLogSink {
        async fn append(&self, entry: LogEntry) -> Result<(), StoreError> {
            if self.failing {
                return Err(StoreError::Unavailable("log sink rejected the entry".to_string()));
            }
            self.entries.write().await.push(entry);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::form::FormRecord;
    use chrono::{Duration, Utc};
    use serde_json::{json, Map};

    #[tokio::test]
    async fn test_list_pending_orders_by_submission_and_limits() {
        let store = InMemoryFormStore::new();
        let now = Utc::now();
        for (id, minutes_ago) in [(1, 5), (2, 30), (3, 10)] {
            let mut record = FormRecord::new(FormId::new(id), Map::new());
            record.submitted_at = Some(now - Duration::minutes(minutes_ago));
            store.insert(record).await;
        }

        let pending = store.list_pending(2).await.unwrap();
        let ids: Vec<i64> = pending.iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_clear_sync_status_uses_update() {
        let store = InMemoryFormStore::new();
        let mut record = FormRecord::new(FormId::new(4), Map::new());
        record.sync.sync_error = Some("boom".to_string());
        store.insert(record).await;

        store.clear_sync_status(FormId::new(4)).await.unwrap();
        assert_eq!(store.form(FormId::new(4)).await.unwrap().sync, SyncStatus::default());
    }

    #[tokio::test]
    async fn test_failing_log_sink() {
        let sink = InMemoryLogSink::failing();
        let entry = LogEntry::sync(LogLevel::Info, "hello", json!({}));
        assert!(sink.append(entry).await.is_err());
        assert!(sink.entries().await.is_empty());
    }

    #[test]
    fn test_log_entry_wire_shape() {
        let entry = LogEntry::sync(LogLevel::Error, "sync failed", json!({ "formId": 3 }));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "crm_sync");
        assert_eq!(value["level"], "error");
    }
}
