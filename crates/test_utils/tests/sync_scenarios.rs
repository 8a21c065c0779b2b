//! End-to-end sync scenarios on the shared harness

use proptest::prelude::*;
use serde_json::json;

use domain_crm::{normalize_phone, MatchedBy};
use domain_sync::{LogLevel, SyncStage};
use test_utils::{
    assert_ext_ids, assert_failed_at, assert_linked_to, assert_synced, company_name_strategy,
    domestic_phone_strategy, form_payload_strategy, ico_strategy, CrmFixtures, FormFixtures,
    FormRecordBuilder, MappingFixtures, SyncHarness, ALFA_ICO,
};

#[tokio::test]
async fn test_complete_form_syncs_company_person_and_custom_fields() {
    let harness = SyncHarness::builder().with_mapping(MappingFixtures::inquiry()).build();
    let form = harness.store(FormRecordBuilder::new(1).build()).await;

    let result = harness.orchestrator.sync_form(&form, None).await;
    let company_id = assert_synced(&result);

    let company = harness.crm.record("company", company_id).await.unwrap();
    assert_ext_ids(&company, &["webform-company:1"]);
    assert_eq!(company["regNumber"], ALFA_ICO);
    assert_eq!(company["addresses"][0]["address"]["city"], "Brno");
    assert_eq!(
        company["customFields"],
        json!({
            "company_cf_services": "Tvorba webu, Optimalizace pro vyhledávače",
            "company_cf_budget": 150000,
            "company_cf_start": "2024-04-01",
            "company_cf_gdpr": true,
        })
    );

    let person = harness.crm.record("person", result.person_id.unwrap()).await.unwrap();
    assert_eq!(person["titleBefore"], "Ing.");
    assert_eq!(person["contactInfo"]["tel1"], "+420603123456");
    assert_linked_to(&person, company_id);

    let stored = harness.stored(&form).await.unwrap();
    assert!(stored.sync.is_synced());
}

#[tokio::test]
async fn test_imported_company_is_matched_by_ico_and_keeps_its_links() {
    let harness = SyncHarness::new();
    let existing = harness.crm.insert("company", CrmFixtures::imported_company(ALFA_ICO)).await;
    let form = harness.store(FormRecordBuilder::new(2).build()).await;

    let result = harness.orchestrator.sync_form(&form, None).await;

    assert_eq!(assert_synced(&result), existing);
    assert_eq!(result.company_matched_by, Some(MatchedBy::Ico));
    let company = harness.crm.record("company", existing).await.unwrap();
    assert_ext_ids(&company, &["crm-import:77"]);
    assert_eq!(company["state"], "B_ACTUAL");
}

#[tokio::test]
async fn test_known_person_is_matched_by_email_and_linked() {
    let harness = SyncHarness::new();
    let person_id = harness
        .crm
        .insert("person", CrmFixtures::known_person("jan.novak@alfa.cz"))
        .await;
    let form = harness.store(FormRecordBuilder::new(3).build()).await;

    let result = harness.orchestrator.sync_form(&form, None).await;
    let company_id = assert_synced(&result);

    assert_eq!(result.person_id, Some(person_id));
    assert_eq!(harness.crm.records("person").await.len(), 1);
    let person = harness.crm.record("person", person_id).await.unwrap();
    assert_ext_ids(&person, &[]);
    assert_linked_to(&person, company_id);
}

#[tokio::test]
async fn test_unnamed_additional_contact_fails_alone() {
    let harness = SyncHarness::new();
    let form = harness
        .store(FormRecordBuilder::new(4).with_payload(FormFixtures::with_additional_contacts()).build())
        .await;

    let result = harness.orchestrator.sync_form(&form, None).await;
    let company_id = assert_synced(&result);

    assert!(result.person_id.is_some());
    assert_eq!(result.additional_contacts.len(), 1);
    assert_eq!(result.additional_contacts[0].index, 1);
    assert_eq!(result.contact_failures.len(), 1);
    assert_eq!(result.contact_failures[0].index, 2);

    let petr = harness
        .crm
        .record("person", result.additional_contacts[0].person_id)
        .await
        .unwrap();
    assert_ext_ids(&petr, &["webform-person:4-1"]);
    assert_linked_to(&petr, company_id);
    assert_eq!(harness.log.entries_at(LogLevel::Warning).await.len(), 1);
}

#[tokio::test]
async fn test_form_without_company_name_fails_before_contacts() {
    let harness = SyncHarness::new();
    let form = harness
        .store(FormRecordBuilder::new(5).with_payload(FormFixtures::nameless()).build())
        .await;

    let result = harness.orchestrator.sync_form(&form, None).await;

    assert_failed_at(&result, SyncStage::SyncCompany, "name");
    assert!(harness.crm.records("person").await.is_empty());
    let stored = harness.stored(&form).await.unwrap();
    assert_eq!(stored.sync.sync_error, result.error);
}

#[tokio::test]
async fn test_unconfigured_crm_fails_fast() {
    let harness = SyncHarness::builder().unconfigured().build();
    let form = harness.store(FormRecordBuilder::new(6).build()).await;

    let result = harness.orchestrator.sync_form(&form, None).await;

    assert_failed_at(&result, SyncStage::ValidateConfig, "credentials");
    assert!(harness.crm.requests().await.is_empty());
}

#[tokio::test]
async fn test_company_only_form_has_no_contacts() {
    let harness = SyncHarness::builder().failing_log().build();
    let form = harness
        .store(FormRecordBuilder::new(7).with_payload(FormFixtures::company_only()).build())
        .await;

    let result = harness.orchestrator.sync_form(&form, None).await;

    assert_synced(&result);
    assert_eq!(result.person_id, None);
    assert!(result.contact_failures.is_empty());
    assert!(harness.log.entries().await.is_empty());
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_resync_never_duplicates_records(payload in form_payload_strategy()) {
        runtime().block_on(async {
            let harness = SyncHarness::new();
            let form = harness.store(FormRecordBuilder::new(10).with_payload(payload).build()).await;

            let first = harness.orchestrator.sync_form(&form, None).await;
            let second = harness.orchestrator.resync_form(form.id, None).await.unwrap();

            assert_eq!(assert_synced(&second), assert_synced(&first));
            assert_eq!(second.person_id, first.person_id);
            assert_eq!(harness.crm.records("company").await.len(), 1);
            assert_eq!(harness.crm.records("person").await.len(), 1);
        });
    }

    #[test]
    fn prop_spaced_ico_matches_existing_company((digits, typed) in ico_strategy(), name in company_name_strategy()) {
        runtime().block_on(async {
            let harness = SyncHarness::new();
            let existing = harness.crm.insert("company", CrmFixtures::imported_company(&digits)).await;
            let payload = json!({ "companyName": name, "ico": typed });
            let form = harness
                .store(FormRecordBuilder::new(11).with_payload(payload.as_object().cloned().unwrap()).build())
                .await;

            let result = harness.orchestrator.sync_form(&form, None).await;

            assert_eq!(assert_synced(&result), existing);
            assert_eq!(result.company_matched_by, Some(MatchedBy::Ico));
        });
    }

    #[test]
    fn prop_domestic_phone_gets_country_code((digits, typed) in domestic_phone_strategy()) {
        prop_assert_eq!(normalize_phone(&typed), format!("+420{}", digits));
    }
}
