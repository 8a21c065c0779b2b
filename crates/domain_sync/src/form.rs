//! Form records as read from the local form store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use core_kernel::{CrmId, FormId};

/// Lifecycle status of an intake form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    /// Still being filled in
    Draft,
    /// Submitted by the visitor, eligible for sync
    Submitted,
    /// Handled by the sales team
    Processed,
    Archived,
}

/// Sync bookkeeping stored next to a form
///
/// Only ids, the timestamp and the last error are kept locally; the CRM
/// remains the system of record for the entities themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub crm_company_id: Option<CrmId>,
    pub crm_person_id: Option<CrmId>,
    pub synced_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
}

impl SyncStatus {
    /// Status written after a successful sync
    pub fn succeeded(company_id: CrmId, person_id: Option<CrmId>, synced_at: DateTime<Utc>) -> Self {
        Self {
            crm_company_id: Some(company_id),
            crm_person_id: person_id,
            synced_at: Some(synced_at),
            sync_error: None,
        }
    }

    /// Keeps the previous ids and records `error`
    pub fn failed(&self, error: impl Into<String>) -> Self {
        Self {
            sync_error: Some(error.into()),
            ..self.clone()
        }
    }

    /// True when the last sync completed
    pub fn is_synced(&self) -> bool {
        self.synced_at.is_some() && self.crm_company_id.is_some() && self.sync_error.is_none()
    }
}

/// A stored intake form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    pub id: FormId,
    pub status: FormStatus,
    /// Raw submitted payload, possibly nested per form step
    pub payload: Map<String, Value>,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sync: SyncStatus,
}

impl FormRecord {
    pub fn new(id: FormId, payload: Map<String, Value>) -> Self {
        Self {
            id,
            status: FormStatus::Submitted,
            payload,
            submitted_at: None,
            sync: SyncStatus::default(),
        }
    }

    /// Submitted and not yet successfully synced
    pub fn is_pending(&self) -> bool {
        self.status == FormStatus::Submitted && !self.sync.is_synced()
    }
}

/// Metadata of an uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Uploaded files per form field
pub type Attachments = BTreeMap<String, Vec<FileAttachment>>;

/// Read-only view of a form's sync state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSyncStatus {
    pub form_id: FormId,
    pub synced: bool,
    pub company_id: Option<CrmId>,
    pub person_id: Option<CrmId>,
    pub synced_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<&FormRecord> for FormSyncStatus {
    fn from(record: &FormRecord) -> Self {
        Self {
            form_id: record.id,
            synced: record.sync.is_synced(),
            company_id: record.sync.crm_company_id,
            person_id: record.sync.crm_person_id,
            synced_at: record.sync.synced_at,
            error: record.sync.sync_error.clone(),
        }
    }
}
