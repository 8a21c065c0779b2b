//! CRUD and search over one CRM entity collection

use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

use core_kernel::{CrmError, CrmId, CrmPort};

use crate::entity::{CrmEntity, Record};
use crate::filters::Filters;

/// Repository for records of entity type `E`
pub struct CrmRepository<E: CrmEntity> {
    crm: Arc<dyn CrmPort>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: CrmEntity> Clone for CrmRepository<E> {
    fn clone(&self) -> Self {
        Self::new(self.crm.clone())
    }
}

impl<E: CrmEntity> CrmRepository<E> {
    pub fn new(crm: Arc<dyn CrmPort>) -> Self {
        Self {
            crm,
            _entity: PhantomData,
        }
    }

    fn collection_path() -> String {
        format!("{}/", E::ENDPOINT)
    }

    fn record_path(id: CrmId) -> String {
        format!("{}/{}/", E::ENDPOINT, id)
    }

    /// Lists records matching `filters`
    pub async fn search(
        &self,
        filters: &Filters,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record<E>>, CrmError> {
        let mut params = filters.to_params();
        params.push(("limit".to_string(), limit.to_string()));
        params.push(("offset".to_string(), offset.to_string()));

        let Some(body) = self.crm.get(&Self::collection_path(), &params).await? else {
            return Ok(Vec::new());
        };

        let records: Vec<Record<E>> = body
            .get("data")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Record::hydrate).collect())
            .unwrap_or_default();

        debug!(
            entity = %E::KIND,
            conditions = filters.conditions().len(),
            found = records.len(),
            "CRM search"
        );
        Ok(records)
    }

    /// Creates the record and stores the CRM-assigned id on it
    pub async fn create(&self, record: &mut Record<E>) -> Result<CrmId, CrmError> {
        let missing = record.missing_required_fields();
        if !missing.is_empty() {
            return Err(CrmError::validation_missing(E::KIND.as_str(), missing));
        }

        let response = self.crm.put(&Self::collection_path(), &record.payload()).await?;
        let id = response
            .get("data")
            .and_then(|data| data.get("id"))
            .and_then(CrmId::from_json)
            .ok_or_else(|| {
                CrmError::transformation(format!("{} create response carries no id", E::KIND))
            })?;

        record.id = Some(id);
        info!(entity = %E::KIND, crm_id = %id, external_id = ?record.external_id, "CRM record created");
        Ok(id)
    }

    /// Sends the full payload of an existing record
    pub async fn update(&self, record: &Record<E>) -> Result<CrmId, CrmError> {
        let id = record.id.ok_or_else(|| {
            CrmError::invalid_state(format!("cannot update a {} without an id", E::KIND))
        })?;

        self.crm.post(&Self::record_path(id), &record.payload()).await?;
        info!(entity = %E::KIND, crm_id = %id, "CRM record updated");
        Ok(id)
    }

    /// Creates when the record has no id, updates otherwise
    pub async fn save(&self, record: &mut Record<E>) -> Result<CrmId, CrmError> {
        if record.id.is_some() {
            self.update(record).await
        } else {
            self.create(record).await
        }
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Record<E>>, CrmError> {
        let path = format!("{}/ext/{}/", E::ENDPOINT, external_id);
        Ok(self
            .crm
            .get(&path, &[])
            .await?
            .and_then(|body| body.get("data").and_then(Record::hydrate)))
    }

    pub async fn find_by_id(&self, id: CrmId) -> Result<Option<Record<E>>, CrmError> {
        Ok(self
            .crm
            .get(&Self::record_path(id), &[])
            .await?
            .and_then(|body| body.get("data").and_then(Record::hydrate)))
    }

    /// Single-strategy upsert keyed by the record's external id
    ///
    /// A record found by external id is updated in place; anything else is
    /// created.
    pub async fn find_or_create(&self, record: &mut Record<E>) -> Result<CrmId, CrmError> {
        if let Some(external_id) = record.external_id.clone() {
            if let Some(existing) = self.find_by_external_id(&external_id).await? {
                if let Some(id) = existing.id {
                    record.adopt(id, &Value::Object(existing.data));
                    return self.update(record).await;
                }
            }
        }
        self.create(record).await
    }
}
