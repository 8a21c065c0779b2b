//! Sync orchestrator against the in-memory CRM and stores

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use core_kernel::{CrmError, CrmId, CrmPort, FormId, MockClock, MockCrm};
use domain_crm::MatchedBy;
use domain_fields::catalog::custom_field_keys;
use domain_fields::FieldMapping;
use domain_sync::{
    FormRecord, FormStatus, InMemoryFormStore, InMemoryLogSink, InMemoryMappingStore, LogLevel,
    SyncError, SyncOrchestrator, SyncSettings, SyncStage, SyncStatus,
};

struct Fixture {
    crm: Arc<MockCrm>,
    forms: Arc<InMemoryFormStore>,
    mappings: Arc<InMemoryMappingStore>,
    log: Arc<InMemoryLogSink>,
    clock: MockClock,
    orchestrator: SyncOrchestrator,
}

fn settings() -> SyncSettings {
    SyncSettings {
        admin_base_url: "https://admin.example.cz".to_string(),
        batch_delay_ms: 100,
        ..Default::default()
    }
}

fn fixture_with(crm: MockCrm, mapping: FieldMapping, log: InMemoryLogSink) -> Fixture {
    let crm = Arc::new(crm);
    let forms = Arc::new(InMemoryFormStore::new());
    let mappings = Arc::new(InMemoryMappingStore::with_mapping(mapping));
    let log = Arc::new(log);
    let clock = MockClock::new();

    let port: Arc<dyn CrmPort> = crm.clone();
    let orchestrator = SyncOrchestrator::new(port, forms.clone(), mappings.clone(), settings())
        .with_clock(Arc::new(clock.clone()))
        .with_log_sink(log.clone());

    Fixture {
        crm,
        forms,
        mappings,
        log,
        clock,
        orchestrator,
    }
}

fn fixture() -> Fixture {
    let mapping: FieldMapping = [("budget", "company_cf_1")].into_iter().collect();
    fixture_with(MockCrm::new(), mapping, InMemoryLogSink::new())
}

fn form(id: i64, payload: Value) -> FormRecord {
    FormRecord::new(FormId::new(id), payload.as_object().cloned().unwrap_or_default())
}

async fn stored_form(fixture: &Fixture, id: i64, payload: Value) -> FormRecord {
    let record = form(id, payload);
    fixture.forms.insert(record.clone()).await;
    record
}

fn alfa_payload() -> Value {
    json!({
        "companyName": "Alfa Stavby s.r.o.",
        "ico": "12345678",
        "contactName": "Ing. Jan Novák",
        "contactEmail": "Jan.Novak@alfa.cz",
        "contactPosition": "Jednatel",
        "budget": "150 000",
    })
}

#[tokio::test]
async fn test_new_company_and_primary_contact_are_created_and_linked() {
    let fx = fixture();
    let record = stored_form(&fx, 1, alfa_payload()).await;

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.company_matched_by, None);
    assert_eq!(result.custom_fields_synced, 1);
    let company_id = result.company_id.unwrap();
    let person_id = result.person_id.unwrap();

    let company = fx.crm.record("company", company_id).await.unwrap();
    assert_eq!(company["name"], "Alfa Stavby s.r.o.");
    assert_eq!(company["state"], "A_POTENTIAL");
    assert_eq!(company["extIds"], json!(["webform-company:1"]));
    assert_eq!(company["customFields"], json!({ "company_cf_1": 150000 }));

    let person = fx.crm.record("person", person_id).await.unwrap();
    assert_eq!(person["lastName"], "Novák");
    assert_eq!(person["contactInfo"]["email"], "jan.novak@alfa.cz");
    assert_eq!(person["extIds"], json!(["webform-person:1"]));
    assert_eq!(person["relationships"][0]["company"]["id"], json!(company_id.value()));
    assert_eq!(person["relationships"][0]["type"], "Jednatel");

    let stored = fx.forms.form(FormId::new(1)).await.unwrap();
    assert_eq!(stored.sync.crm_company_id, Some(company_id));
    assert_eq!(stored.sync.crm_person_id, Some(person_id));
    assert_eq!(stored.sync.synced_at, result.synced_at);
    assert_eq!(stored.sync.sync_error, None);

    let info = fx.log.entries_at(LogLevel::Info).await;
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].kind, "crm_sync");
    assert_eq!(info[0].context["companyId"], json!(company_id.value()));
}

#[tokio::test]
async fn test_company_matched_by_ico_keeps_foreign_external_ids() {
    let fx = fixture();
    let existing = fx
        .crm
        .insert(
            "company",
            json!({
                "name": "Alfa Stavby",
                "regNumber": "12345678",
                "rating": "B",
                "state": "B_ACTUAL",
                "role": "A_SUBSCRIBER",
                "extIds": ["crm-import:77"],
            }),
        )
        .await;
    let record = stored_form(&fx, 2, alfa_payload()).await;

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(result.success);
    assert_eq!(result.company_id, Some(existing));
    assert_eq!(result.company_matched_by, Some(MatchedBy::Ico));
    assert_eq!(fx.crm.records("company").await.len(), 1);

    let company = fx.crm.record("company", existing).await.unwrap();
    assert_eq!(company["name"], "Alfa Stavby s.r.o.");
    assert_eq!(company["extIds"], json!(["crm-import:77"]));
    assert_eq!(company["state"], "B_ACTUAL");
    assert_eq!(company["rating"], "B");

    let update = &fx.crm.requests_matching("POST", "company/").await[0];
    let body = update.body.as_ref().unwrap();
    assert!(body.get("extIds").is_none());
    assert!(body.get("state").is_none());
}

#[tokio::test]
async fn test_primary_contact_failure_does_not_fail_the_form() {
    let fx = fixture();
    fx.crm.fail_on("PUT", "person", 500, "person service down").await;
    let record = stored_form(&fx, 3, alfa_payload()).await;

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(result.success);
    assert!(result.is_partial());
    assert!(result.company_id.is_some());
    assert_eq!(result.person_id, None);
    assert_eq!(result.contact_failures.len(), 1);
    assert_eq!(result.contact_failures[0].index, 0);
    assert_eq!(result.contact_failures[0].name.as_deref(), Some("Jan Novák"));
    assert!(result.contact_failures[0].error.contains("person service down"));

    let stored = fx.forms.form(FormId::new(3)).await.unwrap();
    assert!(stored.sync.is_synced());
    assert_eq!(stored.sync.crm_person_id, None);

    let warnings = fx.log.entries_at(LogLevel::Warning).await;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].context["contactIndex"], 0);
}

#[tokio::test]
async fn test_existing_link_is_not_created_twice() {
    let fx = fixture();
    let company = fx
        .crm
        .insert(
            "company",
            json!({
                "name": "Alfa Stavby s.r.o.",
                "rating": "A",
                "state": "A_POTENTIAL",
                "role": "A_SUBSCRIBER",
                "extIds": ["webform-company:4"],
            }),
        )
        .await;
    let person = fx
        .crm
        .insert(
            "person",
            json!({
                "lastName": "Novák",
                "securityLevel": 1,
                "extIds": ["webform-person:4"],
                "primaryRelationship": { "company": { "id": company.value() } },
            }),
        )
        .await;
    let record = stored_form(&fx, 4, alfa_payload()).await;

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(result.success);
    assert_eq!(result.company_matched_by, Some(MatchedBy::ExtId));
    assert_eq!(result.person_id, Some(person));
    assert!(fx.crm.requests_matching("PUT", "person/").await.is_empty());
    assert_eq!(fx.crm.records("person").await.len(), 1);
}

#[tokio::test]
async fn test_additional_contacts_are_isolated() {
    let fx = fixture();
    let record = stored_form(
        &fx,
        5,
        json!({
            "companyName": "Beta a.s.",
            "additionalContacts": [
                { "name": "Eva Malá", "email": "eva@beta.cz", "position": "Nákup" },
                { "email": "bez.jmena@beta.cz" },
                {},
                { "firstName": "Petr", "lastName": "Dvořák" },
            ],
        }),
    )
    .await;

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(result.success);
    assert_eq!(result.person_id, None);
    let indices: Vec<usize> = result.additional_contacts.iter().map(|c| c.index).collect();
    assert_eq!(indices, vec![1, 4]);
    assert!(result.additional_contacts.iter().all(|c| c.linked));

    assert_eq!(result.contact_failures.len(), 1);
    assert_eq!(result.contact_failures[0].index, 2);
    assert!(result.contact_failures[0].error.contains("lastName"));

    let eva = fx.crm.record("person", result.additional_contacts[0].person_id).await.unwrap();
    assert_eq!(eva["extIds"], json!(["webform-person:5-1"]));
    assert_eq!(eva["relationships"][0]["type"], "Nákup");
    let petr = fx.crm.record("person", result.additional_contacts[1].person_id).await.unwrap();
    assert_eq!(petr["extIds"], json!(["webform-person:5-4"]));
    assert!(petr["relationships"][0].get("type").map_or(true, Value::is_null));
}

#[tokio::test]
async fn test_manual_target_company_preserves_its_external_ids() {
    let fx = fixture();
    let target = fx
        .crm
        .insert(
            "company",
            json!({
                "name": "Gama Holding",
                "rating": "A",
                "state": "B_ACTUAL",
                "role": "B_PARTNER",
                "extIds": ["webform-company:99"],
            }),
        )
        .await;
    let record = stored_form(&fx, 6, json!({ "companyName": "Gama" })).await;

    let result = fx.orchestrator.sync_form(&record, Some(target)).await;

    assert!(result.success);
    assert_eq!(result.company_id, Some(target));
    assert_eq!(result.company_matched_by, Some(MatchedBy::Manual));
    let company = fx.crm.record("company", target).await.unwrap();
    assert_eq!(company["extIds"], json!(["webform-company:99"]));
    assert_eq!(company["role"], "B_PARTNER");
    assert!(fx.crm.requests_matching("GET", "company/ext").await.is_empty());
}

#[tokio::test]
async fn test_manual_target_already_carrying_our_external_id() {
    let fx = fixture();
    let target = fx
        .crm
        .insert(
            "company",
            json!({ "name": "Gama", "extIds": ["crm-import:1", "webform-company:7"] }),
        )
        .await;
    let record = stored_form(&fx, 7, json!({ "companyName": "Gama s.r.o." })).await;

    let result = fx.orchestrator.sync_form(&record, Some(target)).await;

    assert_eq!(result.company_matched_by, Some(MatchedBy::ExtId));
    let company = fx.crm.record("company", target).await.unwrap();
    assert_eq!(company["extIds"], json!(["crm-import:1", "webform-company:7"]));
}

#[tokio::test]
async fn test_missing_target_company_fails_and_is_persisted() {
    let fx = fixture();
    let record = stored_form(&fx, 8, alfa_payload()).await;

    let result = fx.orchestrator.sync_form(&record, Some(CrmId::new(999))).await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(SyncStage::SyncCompany));
    assert!(result.error.as_deref().unwrap().contains("999"));
    assert!(fx.crm.records("company").await.is_empty());

    let stored = fx.forms.form(FormId::new(8)).await.unwrap();
    assert_eq!(stored.sync.sync_error, result.error);
    assert_eq!(fx.log.entries_at(LogLevel::Error).await.len(), 1);
}

#[tokio::test]
async fn test_unconfigured_client_fails_before_any_request() {
    let fx = fixture_with(MockCrm::unconfigured(), FieldMapping::new(), InMemoryLogSink::new());
    let record = stored_form(&fx, 9, alfa_payload()).await;

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(SyncStage::ValidateConfig));
    assert!(fx.crm.requests().await.is_empty());
    assert!(fx.forms.form(FormId::new(9)).await.unwrap().sync.sync_error.is_some());

    let err = fx.orchestrator.sync_pending_forms().await.unwrap_err();
    assert!(matches!(err, SyncError::Crm(CrmError::Configuration(_))));
}

#[tokio::test]
async fn test_status_write_failure_is_reported() {
    let fx = fixture();
    let record = stored_form(&fx, 10, json!({ "companyName": "Delta" })).await;
    fx.forms.fail_writes(true);

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(SyncStage::PersistStatus));
    assert!(result.company_id.is_some());
    assert_eq!(result.synced_at, None);
}

#[tokio::test]
async fn test_failing_log_sink_does_not_affect_sync() {
    let fx = fixture_with(MockCrm::new(), FieldMapping::new(), InMemoryLogSink::failing());
    let record = stored_form(&fx, 11, json!({ "companyName": "Epsilon" })).await;

    let result = fx.orchestrator.sync_form(&record, None).await;
    assert!(result.success);
}

#[tokio::test]
async fn test_batch_is_sequential_with_pauses_and_counts() {
    let fx = fixture();
    let forms = vec![
        stored_form(&fx, 20, json!({ "companyName": "První" })).await,
        stored_form(&fx, 21, json!({ "ico": "87654321" })).await,
        stored_form(&fx, 22, json!({ "companyName": "Třetí" })).await,
    ];

    let summary = fx.orchestrator.sync_forms(&forms).await;

    assert_eq!((summary.total, summary.succeeded, summary.failed), (3, 2, 1));
    assert_eq!(summary.results[1].failed_stage, Some(SyncStage::SyncCompany));
    assert!(summary.results[1].error.as_deref().unwrap().contains("name"));
    assert_eq!(fx.clock.sleeps(), vec![Duration::from_millis(100); 2]);
}

#[tokio::test]
async fn test_pending_forms_skip_synced_and_drafts() {
    let fx = fixture();
    stored_form(&fx, 30, json!({ "companyName": "Pending" })).await;

    let mut synced = form(31, json!({ "companyName": "Done" }));
    synced.sync = SyncStatus::succeeded(CrmId::new(5), None, chrono::Utc::now());
    fx.forms.insert(synced).await;

    let mut draft = form(32, json!({ "companyName": "Draft" }));
    draft.status = FormStatus::Draft;
    fx.forms.insert(draft).await;

    let summary = fx.orchestrator.sync_pending_forms().await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.results[0].form_id, FormId::new(30));
    assert!(fx.forms.form(FormId::new(30)).await.unwrap().sync.is_synced());

    let again = fx.orchestrator.sync_pending_forms().await.unwrap();
    assert_eq!(again.total, 0);
}

#[tokio::test]
async fn test_resync_updates_the_same_company() {
    let fx = fixture();
    let record = stored_form(&fx, 40, alfa_payload()).await;
    let first = fx.orchestrator.sync_form(&record, None).await;

    let second = fx.orchestrator.resync_form(FormId::new(40), None).await.unwrap();

    assert!(second.success);
    assert_eq!(second.company_id, first.company_id);
    assert_eq!(second.company_matched_by, Some(MatchedBy::ExtId));
    assert_eq!(second.person_id, first.person_id);
    assert_eq!(fx.crm.records("company").await.len(), 1);
    assert_eq!(fx.crm.records("person").await.len(), 1);
    assert_eq!(fx.crm.requests_matching("PUT", "person/").await.len(), 2);
    assert_ne!(second.run_id, first.run_id);
}

#[tokio::test]
async fn test_sync_status_projection() {
    let fx = fixture();
    let record = stored_form(&fx, 50, json!({ "companyName": "Zeta" })).await;

    let before = fx.orchestrator.get_sync_status(FormId::new(50)).await.unwrap();
    assert!(!before.synced);

    let result = fx.orchestrator.sync_form(&record, None).await;
    let after = fx.orchestrator.get_sync_status(FormId::new(50)).await.unwrap();
    assert!(after.synced);
    assert_eq!(after.company_id, result.company_id);
    assert_eq!(after.error, None);

    let missing = fx.orchestrator.get_sync_status(FormId::new(404)).await.unwrap_err();
    assert!(matches!(missing, SyncError::FormNotFound(id) if id == FormId::new(404)));
    assert!(matches!(
        fx.orchestrator.resync_form(FormId::new(404), None).await,
        Err(SyncError::FormNotFound(_))
    ));
}

#[tokio::test]
async fn test_provision_custom_fields_maps_every_custom_key() {
    let fx = fixture();
    fx.crm
        .add_custom_field(
            "Company",
            json!({
                "name": "company_cf_legacy",
                "label": "Požadované služby",
                "groupName": "Obchod",
                "dataType": "ENUMERATION",
            }),
        )
        .await;

    let report = fx.orchestrator.provision_custom_fields(None).await.unwrap();

    let expected_created = custom_field_keys().len() - 2;
    assert!(report.errors.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.created.len(), expected_created);
    assert_eq!(fx.clock.sleeps(), vec![Duration::from_millis(250); expected_created - 1]);

    let mapping = fx.mappings.mapping().await;
    assert_eq!(mapping.get("budget"), Some("company_cf_1"));
    assert_eq!(mapping.get("services"), Some("company_cf_legacy"));
    assert!(custom_field_keys().iter().all(|key| mapping.contains(key)));
    assert_eq!(fx.mappings.save_count(), 1);

    let again = fx.orchestrator.provision_custom_fields(None).await.unwrap();
    assert!(again.created.is_empty());
    assert_eq!(fx.mappings.save_count(), 1);
}

#[tokio::test]
async fn test_recover_field_mapping_adds_only_missing_entries() {
    let mapping: FieldMapping = [("services", "company_cf_custom")].into_iter().collect();
    let fx = fixture_with(MockCrm::new(), mapping, InMemoryLogSink::new());
    for (name, label) in [("company_cf_8", "Požadované služby"), ("company_cf_9", "Rozpočet")] {
        fx.crm
            .add_custom_field(
                "Company",
                json!({
                    "name": name,
                    "label": label,
                    "groupName": "Webový formulář - Poptávka",
                    "dataType": "STRING",
                }),
            )
            .await;
    }

    let recovery = fx.orchestrator.recover_field_mapping().await.unwrap();

    assert_eq!(recovery.detected.matched.len(), 2);
    assert_eq!(recovery.added, 1);
    let stored = fx.mappings.mapping().await;
    assert_eq!(stored.get("services"), Some("company_cf_custom"));
    assert_eq!(stored.get("budget"), Some("company_cf_9"));
}

#[tokio::test]
async fn test_step_payload_and_metadata_reach_custom_fields() {
    let mapping: FieldMapping = [
        ("budget", "company_cf_1"),
        ("adminUrl", "company_cf_2"),
        ("formId", "company_cf_3"),
    ]
    .into_iter()
    .collect();
    let fx = fixture_with(MockCrm::new(), mapping, InMemoryLogSink::new());
    let record = stored_form(
        &fx,
        60,
        json!({
            "step1": { "companyName": "Eta s.r.o." },
            "step3": { "budget": "20000" },
        }),
    )
    .await;

    let result = fx.orchestrator.sync_form(&record, None).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.custom_fields_synced, 3);
    let company = fx.crm.record("company", result.company_id.unwrap()).await.unwrap();
    assert_eq!(company["name"], "Eta s.r.o.");
    let custom: &Map<String, Value> = company["customFields"].as_object().unwrap();
    assert_eq!(custom["company_cf_1"], 20000);
    assert_eq!(custom["company_cf_2"], "https://admin.example.cz/forms/60");
    assert_eq!(custom["company_cf_3"], "60");
}
