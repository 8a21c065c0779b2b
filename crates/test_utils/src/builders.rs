//! Test Data Builders
//!
//! Builders with sensible defaults so tests only spell out what matters to them.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use core_kernel::{CrmId, FormId};
use domain_sync::{FormRecord, FormStatus, SyncStatus};

use crate::fixtures::{FormFixtures, TemporalFixtures};

/// Builder for stored form records
pub struct FormRecordBuilder {
    id: FormId,
    status: FormStatus,
    payload: Map<String, Value>,
    submitted_at: Option<DateTime<Utc>>,
    sync: SyncStatus,
}

impl Default for FormRecordBuilder {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FormRecordBuilder {
    /// Submitted form carrying the complete fixture payload
    pub fn new(id: i64) -> Self {
        Self {
            id: FormId::new(id),
            status: FormStatus::Submitted,
            payload: FormFixtures::complete(),
            submitted_at: Some(TemporalFixtures::submitted_at()),
            sync: SyncStatus::default(),
        }
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Sets a top-level payload value
    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    /// Removes a key from the top level and from every step
    pub fn without_field(mut self, key: &str) -> Self {
        self.payload.remove(key);
        for value in self.payload.values_mut() {
            if let Value::Object(step) = value {
                step.remove(key);
            }
        }
        self
    }

    pub fn with_status(mut self, status: FormStatus) -> Self {
        self.status = status;
        self
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(at);
        self
    }

    /// Marks the form as already synced
    pub fn synced(mut self, company_id: i64) -> Self {
        self.sync = SyncStatus::succeeded(CrmId::new(company_id), None, TemporalFixtures::submitted_at());
        self
    }

    pub fn with_sync_error(mut self, error: &str) -> Self {
        self.sync.sync_error = Some(error.to_string());
        self
    }

    pub fn build(self) -> FormRecord {
        FormRecord {
            id: self.id,
            status: self.status,
            payload: self.payload,
            submitted_at: self.submitted_at,
            sync: self.sync,
        }
    }
}
