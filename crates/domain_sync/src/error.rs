//! Sync errors
//!
//! `SyncError` is what the orchestrator's fallible steps return. `sync_form`
//! itself never returns it: the message ends up in `SyncResult::error` and in
//! the form store instead.

use thiserror::Error;

use core_kernel::{CrmError, CrmId, FormId};

/// Errors raised by the form, mapping and log stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be read or written in the expected shape
    #[error("Store serialization error: {0}")]
    Serialization(String),
}

/// Errors that can occur while synchronizing a form
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Crm(#[from] CrmError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// No form with the given id exists in the form store
    #[error("Form not found: {0}")]
    FormNotFound(FormId),

    /// The company an administrator linked the form to does not exist
    #[error("Target company not found in CRM: {0}")]
    TargetCompanyNotFound(CrmId),
}

impl SyncError {
    /// True when retrying the same form later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Crm(error) => error.is_transient(),
            SyncError::Store(StoreError::Unavailable(_)) => true,
            _ => false,
        }
    }
}
