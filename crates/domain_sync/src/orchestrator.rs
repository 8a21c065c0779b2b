//! Sync Orchestrator
//!
//! Drives one form through the sync stages:
//!
//! ```text
//! START → VALIDATE_CONFIG → BUILD_PAYLOAD → SYNC_COMPANY
//!       → SYNC_PRIMARY_CONTACT? → SYNC_ADDITIONAL_CONTACTS? → PERSIST_STATUS → DONE
//! ```
//!
//! Any stage may fail; the result then carries `success == false` and the
//! stage in `failed_stage`. Contact failures are recorded on the result
//! and never fail the form. Every CRM call is awaited in sequence; batches
//! process one form at a time with a pause in between.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use core_kernel::{Clock, CrmError, CrmId, CrmPort, EntityKind, FormId, SyncRunId, SystemClock};
use domain_crm::source::{self, keys};
use domain_crm::{
    additional_contact_external_id, is_empty_value, Company, CompanyCriteria, CrmEntity,
    CrmRepository, DuplicateCheckConfig, DuplicateChecker, MatchResult, MatchedBy, Person,
    PersonCriteria, Record,
};
use domain_fields::catalog::custom_field_keys;
use domain_fields::{CustomFieldMapper, FieldCreationReport};

use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::form::{FormRecord, FormSyncStatus, SyncStatus};
use crate::payload::build_sync_payload;
use crate::ports::{FieldMappingStore, FormStore, LogEntry, LogLevel, SyncLogSink, TracingLogSink};
use crate::result::{
    BatchSyncSummary, ContactFailure, ContactSyncResult, MappingRecovery, SyncResult, SyncStage,
};

/// Key of the relationship type inside an additional-contact entry
const CONTACT_ENTRY_POSITION: &str = "position";

/// Synchronizes stored forms into the CRM
pub struct SyncOrchestrator {
    crm: Arc<dyn CrmPort>,
    forms: Arc<dyn FormStore>,
    mappings: Arc<dyn FieldMappingStore>,
    log: Arc<dyn SyncLogSink>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    companies: CrmRepository<Company>,
    persons: CrmRepository<Person>,
    checker: DuplicateChecker,
    mapper: CustomFieldMapper,
}

fn build_mapper(crm: &Arc<dyn CrmPort>, clock: &Arc<dyn Clock>, settings: &SyncSettings) -> CustomFieldMapper {
    CustomFieldMapper::new(crm.clone(), clock.clone())
        .with_cache_ttl(settings.config_cache_ttl())
        .with_creation_delay(settings.field_creation_delay())
        .with_file_base_url(settings.file_base_url.clone())
}

impl SyncOrchestrator {
    pub fn new(
        crm: Arc<dyn CrmPort>,
        forms: Arc<dyn FormStore>,
        mappings: Arc<dyn FieldMappingStore>,
        settings: SyncSettings,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            companies: CrmRepository::new(crm.clone()),
            persons: CrmRepository::new(crm.clone()),
            checker: DuplicateChecker::new(crm.clone(), DuplicateCheckConfig::default()),
            mapper: build_mapper(&crm, &clock, &settings),
            log: Arc::new(TracingLogSink),
            crm,
            forms,
            mappings,
            clock,
            settings,
        }
    }

    /// Replaces the clock used for batch pauses, field-creation pauses and the config cache
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.mapper = build_mapper(&self.crm, &clock, &self.settings);
        self.clock = clock;
        self
    }

    pub fn with_log_sink(mut self, log: Arc<dyn SyncLogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn with_duplicate_config(mut self, config: DuplicateCheckConfig) -> Self {
        self.checker = DuplicateChecker::new(self.crm.clone(), config);
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn mapper(&self) -> &CustomFieldMapper {
        &self.mapper
    }

    fn ensure_configured(&self) -> Result<(), CrmError> {
        if self.crm.is_configured() {
            Ok(())
        } else {
            Err(CrmError::configuration(
                "CRM credentials are missing or still set to the placeholder",
            ))
        }
    }

    async fn log(&self, level: LogLevel, message: &str, context: Value) {
        if let Err(error) = self.log.append(LogEntry::sync(level, message, context)).await {
            warn!(%error, entry = message, "sync log entry dropped");
        }
    }

    /// Synchronizes one form
    ///
    /// Never fails: errors are returned inside the result and written to the
    /// form store. `target_company_id` links the form to a company chosen by
    /// an administrator instead of running duplicate detection.
    #[instrument(skip(self, form), fields(form_id = %form.id, run_id = tracing::field::Empty))]
    pub async fn sync_form(&self, form: &FormRecord, target_company_id: Option<CrmId>) -> SyncResult {
        let run_id = SyncRunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let mut result = SyncResult::started(run_id, form.id);
        let mut stage = SyncStage::Start;

        match self.run(form, target_company_id, &mut result, &mut stage).await {
            Ok(()) => {
                result.success = true;
                info!(
                    company_id = ?result.company_id,
                    person_id = ?result.person_id,
                    contacts = result.additional_contacts.len(),
                    contact_failures = result.contact_failures.len(),
                    "form synced"
                );
                self.log(
                    LogLevel::Info,
                    "Form synced to CRM",
                    json!({
                        "runId": run_id.to_string(),
                        "formId": form.id.value(),
                        "companyId": result.company_id.map(|id| id.value()),
                        "personId": result.person_id.map(|id| id.value()),
                        "matchedBy": result.company_matched_by.map(|m| m.as_str()),
                        "customFields": result.custom_fields_synced,
                    }),
                )
                .await;
            }
            Err(failure) => {
                let message = failure.to_string();
                error!(stage = %stage, error = %failure, "form sync failed");

                result.error = Some(message.clone());
                result.failed_stage = Some(stage);
                if let Err(store_error) = self
                    .forms
                    .update_sync_status(form.id, &form.sync.failed(message.clone()))
                    .await
                {
                    warn!(error = %store_error, "could not record sync error on form");
                }
                self.log(
                    LogLevel::Error,
                    "Form sync failed",
                    json!({
                        "runId": run_id.to_string(),
                        "formId": form.id.value(),
                        "stage": stage.as_str(),
                        "error": message,
                    }),
                )
                .await;
            }
        }
        result
    }

    async fn run(
        &self,
        form: &FormRecord,
        target_company_id: Option<CrmId>,
        result: &mut SyncResult,
        stage: &mut SyncStage,
    ) -> Result<(), SyncError> {
        *stage = SyncStage::ValidateConfig;
        self.ensure_configured()?;

        *stage = SyncStage::BuildPayload;
        let attachments = self.forms.attachments(form.id).await?;
        let payload = build_sync_payload(form, &attachments, &self.settings.admin_base_url);
        let mapping = self.mappings.load().await?;
        let custom_fields = self.mapper.build_custom_fields_payload(&payload, &mapping);
        result.custom_fields_synced = custom_fields.len();

        *stage = SyncStage::SyncCompany;
        let (company_id, matched_by) = self
            .sync_company(&payload, form.id, custom_fields, target_company_id)
            .await?;
        result.company_id = Some(company_id);
        result.company_matched_by = matched_by;

        if Person::has_primary_contact(&payload) {
            *stage = SyncStage::SyncPrimaryContact;
            let person = Person::from_source(&payload, form.id);
            let position = source::text(&payload, keys::CONTACT_POSITION);
            match self
                .sync_contact(&person, Person::external_id_for(form.id), company_id, position.as_deref())
                .await
            {
                Ok(contact) => result.person_id = Some(contact.person_id),
                Err(failure) => self.record_contact_failure(result, 0, &person, failure).await,
            }
        }

        let entries = additional_contact_entries(&payload);
        if !entries.is_empty() {
            *stage = SyncStage::SyncAdditionalContacts;
            for (index, entry) in entries {
                let person = Person::from_contact_entry(entry);
                let external_id = additional_contact_external_id(form.id, index);
                let position = source::text(entry, CONTACT_ENTRY_POSITION);
                match self
                    .sync_contact(&person, external_id, company_id, position.as_deref())
                    .await
                {
                    Ok(mut contact) => {
                        contact.index = index;
                        result.additional_contacts.push(contact);
                    }
                    Err(failure) => self.record_contact_failure(result, index, &person, failure).await,
                }
            }
        }

        *stage = SyncStage::PersistStatus;
        let synced_at = self.clock.now();
        self.forms
            .update_sync_status(form.id, &SyncStatus::succeeded(company_id, result.person_id, synced_at))
            .await?;
        result.synced_at = Some(synced_at);

        *stage = SyncStage::Done;
        Ok(())
    }

    async fn sync_company(
        &self,
        payload: &Map<String, Value>,
        form_id: FormId,
        custom_fields: Map<String, Value>,
        target_company_id: Option<CrmId>,
    ) -> Result<(CrmId, Option<MatchedBy>), SyncError> {
        let mut company = Company::from_source(payload, form_id);
        company.custom_fields = custom_fields;
        let external_id = Company::external_id_for(form_id);
        let mut record = Record::from_entity(&company, Some(external_id.clone()));

        let found = match target_company_id {
            Some(id) => Some(self.target_company(id, &external_id).await?),
            None => {
                self.checker
                    .find_existing_company(Some(&external_id), &CompanyCriteria::from_company(&company))
                    .await
            }
        };

        match found {
            Some(found) => {
                record.apply_match(&found);
                let id = self.companies.update(&record).await?;
                info!(crm_id = %id, matched_by = %found.matched_by, "existing company updated");
                Ok((id, Some(found.matched_by)))
            }
            None => {
                let id = self.companies.create(&mut record).await?;
                Ok((id, None))
            }
        }
    }

    /// Company picked by an administrator, as a match
    async fn target_company(&self, id: CrmId, external_id: &str) -> Result<MatchResult, SyncError> {
        let existing = self
            .companies
            .find_by_id(id)
            .await?
            .ok_or(SyncError::TargetCompanyNotFound(id))?;

        let matched_by = if existing.known_external_ids().iter().any(|ext| ext == external_id) {
            MatchedBy::ExtId
        } else {
            MatchedBy::Manual
        };
        Ok(MatchResult {
            id,
            matched_by,
            data: Value::Object(existing.data),
        })
    }

    /// Person smart sync followed by an idempotent link to the company
    async fn sync_contact(
        &self,
        person: &Person,
        external_id: String,
        company_id: CrmId,
        position: Option<&str>,
    ) -> Result<ContactSyncResult, SyncError> {
        let criteria = PersonCriteria::from_person(person);
        let found = self
            .checker
            .find_existing_person(Some(&external_id), &criteria)
            .await;
        let mut record = Record::from_entity(person, Some(external_id));

        let (person_id, already_linked) = match &found {
            Some(found) => {
                record.apply_match(found);
                let id = self.persons.update(&record).await?;
                (id, is_linked_to(&found.data, company_id))
            }
            None => (self.persons.create(&mut record).await?, false),
        };

        if already_linked {
            debug!(person_id = %person_id, company_id = %company_id, "person already linked");
        } else {
            self.link_person(person_id, company_id, position).await?;
        }

        Ok(ContactSyncResult {
            index: 0,
            person_id,
            matched_by: found.map(|f| f.matched_by),
            linked: !already_linked,
        })
    }

    async fn link_person(
        &self,
        person_id: CrmId,
        company_id: CrmId,
        position: Option<&str>,
    ) -> Result<(), SyncError> {
        let mut body = Map::new();
        body.insert("company".to_string(), json!(company_id.value()));
        if let Some(position) = position {
            body.insert("type".to_string(), json!(position));
        }
        let path = format!("{}/{}/relationship/", Person::ENDPOINT, person_id);
        self.crm.put(&path, &Value::Object(body)).await?;
        info!(person_id = %person_id, company_id = %company_id, "person linked to company");
        Ok(())
    }

    async fn record_contact_failure(
        &self,
        result: &mut SyncResult,
        index: usize,
        person: &Person,
        failure: SyncError,
    ) {
        let name = display_name(person);
        warn!(index, name = ?name, error = %failure, "contact sync failed");
        self.log(
            LogLevel::Warning,
            "Contact sync failed",
            json!({
                "formId": result.form_id.value(),
                "companyId": result.company_id.map(|id| id.value()),
                "contactIndex": index,
                "name": name,
                "error": failure.to_string(),
            }),
        )
        .await;
        result.contact_failures.push(ContactFailure {
            index,
            name,
            error: failure.to_string(),
        });
    }

    /// Loads a form by id and synchronizes it
    pub async fn sync_form_by_id(
        &self,
        form_id: FormId,
        target_company_id: Option<CrmId>,
    ) -> Result<SyncResult, SyncError> {
        let form = self.load_form(form_id).await?;
        Ok(self.sync_form(&form, target_company_id).await)
    }

    /// Synchronizes forms one after another with a pause in between
    #[instrument(skip(self, forms), fields(count = forms.len()))]
    pub async fn sync_forms(&self, forms: &[FormRecord]) -> BatchSyncSummary {
        let mut summary = BatchSyncSummary::default();
        for (position, form) in forms.iter().enumerate() {
            if position > 0 {
                self.clock.sleep(self.settings.batch_delay()).await;
            }
            summary.push(self.sync_form(form, None).await);
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch sync finished"
        );
        summary
    }

    /// Synchronizes up to `batch_size` submitted forms that have not synced yet
    #[instrument(skip(self))]
    pub async fn sync_pending_forms(&self) -> Result<BatchSyncSummary, SyncError> {
        self.ensure_configured()?;
        let pending = self.forms.list_pending(self.settings.batch_size).await?;
        if pending.is_empty() {
            debug!("no pending forms");
            return Ok(BatchSyncSummary::default());
        }
        Ok(self.sync_forms(&pending).await)
    }

    /// Forgets the previous sync of a form and runs it again
    #[instrument(skip(self))]
    pub async fn resync_form(
        &self,
        form_id: FormId,
        target_company_id: Option<CrmId>,
    ) -> Result<SyncResult, SyncError> {
        let mut form = self.load_form(form_id).await?;
        self.forms.clear_sync_status(form_id).await?;
        form.sync = SyncStatus::default();
        Ok(self.sync_form(&form, target_company_id).await)
    }

    pub async fn get_sync_status(&self, form_id: FormId) -> Result<FormSyncStatus, SyncError> {
        let form = self.load_form(form_id).await?;
        Ok(FormSyncStatus::from(&form))
    }

    async fn load_form(&self, form_id: FormId) -> Result<FormRecord, SyncError> {
        self.forms
            .get(form_id)
            .await?
            .ok_or(SyncError::FormNotFound(form_id))
    }

    /// Creates company custom fields for every catalog key not yet mapped
    ///
    /// Created and pre-existing fields are added to the stored mapping.
    #[instrument(skip(self))]
    pub async fn provision_custom_fields(
        &self,
        group_override: Option<&str>,
    ) -> Result<FieldCreationReport, SyncError> {
        self.ensure_configured()?;
        let mut mapping = self.mappings.load().await?;
        let keys: Vec<&str> = custom_field_keys()
            .into_iter()
            .filter(|key| !mapping.contains(key))
            .collect();
        if keys.is_empty() {
            debug!("every custom field is already mapped");
            return Ok(FieldCreationReport::default());
        }

        let report = self
            .mapper
            .create_fields_from_form_mapping(EntityKind::Company, &keys, group_override)
            .await?;
        let added = mapping.merge_missing(&report.mapping());
        if added > 0 {
            self.mappings.save(&mapping).await?;
        }

        self.log(
            LogLevel::Info,
            "Custom fields provisioned",
            json!({
                "created": report.created.len(),
                "skipped": report.skipped.len(),
                "errors": report.errors.len(),
                "mapped": added,
            }),
        )
        .await;
        Ok(report)
    }

    /// Rebuilds missing mapping entries from the fields already in the CRM
    #[instrument(skip(self))]
    pub async fn recover_field_mapping(&self) -> Result<MappingRecovery, SyncError> {
        self.ensure_configured()?;
        let detected = self
            .mapper
            .detect_mapping_from_existing_fields(EntityKind::Company)
            .await?;
        let mut mapping = self.mappings.load().await?;
        let added = mapping.merge_missing(&detected.mapping);
        if added > 0 {
            self.mappings.save(&mapping).await?;
        }
        info!(added, matched = detected.matched.len(), "field mapping recovered");
        Ok(MappingRecovery { detected, added })
    }
}

/// Non-empty object entries of the additional-contacts list with their 1-based position
fn additional_contact_entries(payload: &Map<String, Value>) -> Vec<(usize, &Map<String, Value>)> {
    payload
        .get(keys::ADDITIONAL_CONTACTS)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .enumerate()
                .filter_map(|(i, entry)| entry.as_object().map(|entry| (i + 1, entry)))
                .filter(|(_, entry)| entry.values().any(|value| !is_empty_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// True when a CRM person record already carries a link to `company_id`
fn is_linked_to(person: &Value, company_id: CrmId) -> bool {
    let links_to = |relationship: &Value| {
        relationship
            .get("company")
            .and_then(|company| company.get("id"))
            .and_then(CrmId::from_json)
            == Some(company_id)
    };

    person.get("primaryRelationship").map_or(false, links_to)
        || person
            .get("relationships")
            .and_then(Value::as_array)
            .map_or(false, |links| links.iter().any(links_to))
}

fn display_name(person: &Person) -> Option<String> {
    let name = [person.first_name.as_deref(), Some(person.last_name.as_str())]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_linked_to_reads_primary_and_list() {
        let company = CrmId::new(7);
        assert!(is_linked_to(&json!({ "primaryRelationship": { "company": { "id": 7 } } }), company));
        assert!(is_linked_to(
            &json!({ "relationships": [{ "company": { "id": 3 } }, { "company": { "id": "7" } }] }),
            company
        ));
        assert!(!is_linked_to(&json!({ "relationships": [{ "company": { "id": 3 } }] }), company));
        assert!(!is_linked_to(&json!({}), company));
    }

    #[test]
    fn test_additional_contact_entries_keep_list_positions() {
        let payload = json!({
            "additionalContacts": [
                { "name": "Eva Malá" },
                { "name": "", "email": "  " },
                "not a contact",
                { "email": "petr@example.cz" },
            ]
        });
        let entries = additional_contact_entries(payload.as_object().unwrap());
        let positions: Vec<usize> = entries.iter().map(|(i, _)| *i).collect();
        assert_eq!(positions, vec![1, 4]);
    }

    #[test]
    fn test_display_name() {
        let person = Person {
            first_name: Some("Jana".to_string()),
            last_name: "Nová".to_string(),
            ..Default::default()
        };
        assert_eq!(display_name(&person).as_deref(), Some("Jana Nová"));
        assert_eq!(display_name(&Person::default()), None);
    }
}
