//! Repository behaviour against the in-memory CRM

use std::sync::Arc;

use core_kernel::{CrmError, CrmId, CrmPort, FormId, MockCrm};
use domain_crm::{Company, CrmRepository, Filters, Person, Record};
use serde_json::{json, Map, Value};

fn source(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn setup() -> (Arc<MockCrm>, CrmRepository<Company>) {
    let crm = Arc::new(MockCrm::new());
    let port: Arc<dyn CrmPort> = crm.clone();
    (crm, CrmRepository::new(port))
}

#[tokio::test]
async fn test_create_assigns_id_and_sends_external_id() {
    let (crm, companies) = setup();
    let mut record = Record::<Company>::from_source(
        &source(json!({ "companyName": "Alfa", "ico": "12345678" })),
        FormId::new(5),
    );

    let id = companies.create(&mut record).await.unwrap();
    assert_eq!(record.id, Some(id));

    let stored = crm.record("company", id).await.unwrap();
    assert_eq!(stored["name"], "Alfa");
    assert_eq!(stored["extIds"], json!(["webform-company:5"]));
    assert_eq!(stored["state"], "A_POTENTIAL");
}

#[tokio::test]
async fn test_create_names_exactly_the_missing_fields() {
    let (crm, companies) = setup();
    let mut record = Record::<Company>::new(source(json!({
        "name": "",
        "rating": "A",
        "state": null,
    })));

    let err = companies.create(&mut record).await.unwrap_err();
    assert_eq!(err.missing_fields(), ["name".to_string(), "state".to_string(), "role".to_string()]);
    assert!(matches!(err, CrmError::Validation { .. }));
    assert!(crm.requests().await.is_empty());
}

#[tokio::test]
async fn test_person_security_level_zero_is_present() {
    let crm = Arc::new(MockCrm::new());
    let persons: CrmRepository<Person> = CrmRepository::new(crm.clone());
    let mut record = Record::<Person>::new(source(json!({ "lastName": "Novák", "securityLevel": 0 })));

    assert!(persons.create(&mut record).await.is_ok());
}

#[tokio::test]
async fn test_update_requires_id() {
    let (_crm, companies) = setup();
    let record = Record::<Company>::new(source(json!({ "name": "Alfa" })));

    let err = companies.update(&record).await.unwrap_err();
    assert!(matches!(err, CrmError::InvalidState(_)));
}

#[tokio::test]
async fn test_save_creates_then_updates() {
    let (crm, companies) = setup();
    let mut record = Record::<Company>::from_source(&source(json!({ "companyName": "Alfa" })), FormId::new(1));

    let id = companies.save(&mut record).await.unwrap();
    record.set("notice", json!("follow up"));
    let again = companies.save(&mut record).await.unwrap();

    assert_eq!(id, again);
    assert_eq!(crm.requests_matching("PUT", "company/").await.len(), 1);
    assert_eq!(crm.requests_matching("POST", &format!("company/{}/", id)).await.len(), 1);
    assert_eq!(crm.record("company", id).await.unwrap()["notice"], "follow up");
}

#[tokio::test]
async fn test_find_by_ids_absent_is_none() {
    let (_crm, companies) = setup();
    assert!(companies.find_by_id(CrmId::new(424242)).await.unwrap().is_none());
    assert!(companies
        .find_by_external_id("webform-company:404")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_search_hydrates_records() {
    let (crm, companies) = setup();
    crm.insert("company", json!({ "name": "Alfa Stavby", "extIds": ["webform-company:1"] })).await;
    crm.insert("company", json!({ "name": "Beta Stavby" })).await;
    crm.insert("company", json!({ "name": "Gama" })).await;

    let found = companies
        .search(&Filters::new().contains("name", "stavby"), 10, 0)
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|r| r.id.is_some()));
    assert_eq!(found[0].external_id.as_deref(), Some("webform-company:1"));

    let paged = companies
        .search(&Filters::new().contains("name", "stavby"), 1, 1)
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].get("name"), Some(&json!("Beta Stavby")));

    let request = crm.requests_matching("GET", "company/").await.remove(0);
    assert!(request.params.contains(&("name[LIKE]".to_string(), "%stavby%".to_string())));
    assert!(request.params.contains(&("limit".to_string(), "10".to_string())));
}

#[tokio::test]
async fn test_find_or_create_adopts_record_with_same_external_id() {
    let (crm, companies) = setup();
    let existing = crm
        .insert("company", json!({ "name": "Old name", "extIds": ["erp:9", "webform-company:3"] }))
        .await;

    let mut record = Record::<Company>::from_source(&source(json!({ "companyName": "New name" })), FormId::new(3));
    let id = companies.find_or_create(&mut record).await.unwrap();

    assert_eq!(id, existing);
    let stored = crm.record("company", existing).await.unwrap();
    assert_eq!(stored["name"], "New name");
    assert_eq!(stored["extIds"], json!(["erp:9", "webform-company:3"]));
    assert_eq!(crm.records("company").await.len(), 1);
}

#[tokio::test]
async fn test_find_or_create_creates_when_unknown() {
    let (crm, companies) = setup();
    let mut record = Record::<Company>::from_source(&source(json!({ "companyName": "Fresh" })), FormId::new(4));

    companies.find_or_create(&mut record).await.unwrap();
    assert_eq!(crm.records("company").await.len(), 1);
}
