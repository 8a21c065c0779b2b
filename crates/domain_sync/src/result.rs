//! Outcomes of sync operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{CrmId, FormId, SyncRunId};
use domain_crm::MatchedBy;
use domain_fields::DetectedMapping;

/// Steps of a single form sync, in execution order
///
/// A failed sync has no stage of its own: it is `success == false` with
/// `failed_stage` naming the step that was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStage {
    Start,
    ValidateConfig,
    BuildPayload,
    SyncCompany,
    SyncPrimaryContact,
    SyncAdditionalContacts,
    PersistStatus,
    Done,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Start => "START",
            SyncStage::ValidateConfig => "VALIDATE_CONFIG",
            SyncStage::BuildPayload => "BUILD_PAYLOAD",
            SyncStage::SyncCompany => "SYNC_COMPANY",
            SyncStage::SyncPrimaryContact => "SYNC_PRIMARY_CONTACT",
            SyncStage::SyncAdditionalContacts => "SYNC_ADDITIONAL_CONTACTS",
            SyncStage::PersistStatus => "PERSIST_STATUS",
            SyncStage::Done => "DONE",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contact person written to the CRM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSyncResult {
    /// 0 for the primary contact, 1-based position for additional contacts
    pub index: usize,
    pub person_id: CrmId,
    /// `None` when the person was created
    pub matched_by: Option<MatchedBy>,
    /// False when the person was already linked to the company
    pub linked: bool,
}

/// A contact person that could not be synced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFailure {
    pub index: usize,
    pub name: Option<String>,
    pub error: String,
}

/// Result of syncing one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub run_id: SyncRunId,
    pub form_id: FormId,
    pub success: bool,
    pub company_id: Option<CrmId>,
    pub company_matched_by: Option<MatchedBy>,
    pub person_id: Option<CrmId>,
    pub additional_contacts: Vec<ContactSyncResult>,
    pub contact_failures: Vec<ContactFailure>,
    pub error: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
    pub custom_fields_synced: usize,
    /// Stage that was running when the sync failed
    pub failed_stage: Option<SyncStage>,
}

impl SyncResult {
    pub(crate) fn started(run_id: SyncRunId, form_id: FormId) -> Self {
        Self {
            run_id,
            form_id,
            success: false,
            company_id: None,
            company_matched_by: None,
            person_id: None,
            additional_contacts: Vec::new(),
            contact_failures: Vec::new(),
            error: None,
            synced_at: None,
            custom_fields_synced: 0,
            failed_stage: None,
        }
    }

    /// True when the company synced but some contact did not
    pub fn is_partial(&self) -> bool {
        self.success && !self.contact_failures.is_empty()
    }
}

/// Aggregate of a sequential batch sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSyncSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<SyncResult>,
}

impl BatchSyncSummary {
    pub(crate) fn push(&mut self, result: SyncResult) {
        self.total += 1;
        if result.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }
}

/// Outcome of rebuilding the field mapping from the CRM catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingRecovery {
    pub detected: DetectedMapping,
    /// Entries added to the stored mapping
    pub added: usize,
}
