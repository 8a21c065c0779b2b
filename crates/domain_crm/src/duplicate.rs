//! Duplicate detection
//!
//! Each entity type has an ordered list of lookup strategies, each of which
//! can be switched off. Strategies run in order and the first match wins. A
//! strategy that fails is logged and treated as "no match", so one broken
//! lookup path never hides the ones after it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use core_kernel::{CrmError, CrmId, CrmPort};

use crate::company::{normalize_ico, Company};
use crate::entity::{CrmEntity, Record};
use crate::filters::Filters;
use crate::person::Person;
use crate::phone::normalize_phone;
use crate::repository::CrmRepository;

/// Candidates fetched by the name strategies
pub const NAME_CANDIDATE_LIMIT: usize = 5;

/// How an existing CRM record was identified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    ExtId,
    Ico,
    TaxNumber,
    /// Case-insensitive exact company name among the partial matches
    NameExact,
    /// Best partial company-name match
    NamePartial,
    Email,
    Phone,
    /// Exact first + last name
    Name,
    /// Linked explicitly by an administrator
    Manual,
}

impl MatchedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchedBy::ExtId => "extId",
            MatchedBy::Ico => "ico",
            MatchedBy::TaxNumber => "taxNumber",
            MatchedBy::NameExact => "name_exact",
            MatchedBy::NamePartial => "name_partial",
            MatchedBy::Email => "email",
            MatchedBy::Phone => "phone",
            MatchedBy::Name => "name",
            MatchedBy::Manual => "manual",
        }
    }
}

impl fmt::Display for MatchedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An existing CRM record found by one of the strategies
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub id: CrmId,
    pub matched_by: MatchedBy,
    /// The record as returned by the CRM
    pub data: Value,
}

impl MatchResult {
    fn from_record<E: CrmEntity>(record: Record<E>, matched_by: MatchedBy) -> Option<Self> {
        Some(Self {
            id: record.id?,
            matched_by,
            data: Value::Object(record.data),
        })
    }

    /// External ids on the matched record must be left as they are
    pub fn preserves_external_id(&self) -> bool {
        self.matched_by != MatchedBy::ExtId
    }
}

impl<E: CrmEntity> Record<E> {
    /// Points this record at a matched CRM record before an update
    ///
    /// Unless the match came from our own external id, the external id is
    /// withheld so links to other source records stay intact. Fields listed in
    /// `PRESERVED_ON_UPDATE` are dropped so the update cannot regress them.
    pub fn apply_match(&mut self, found: &MatchResult) {
        self.adopt(found.id, &found.data);
        if found.preserves_external_id() {
            self.external_id = None;
        }
        for field in E::PRESERVED_ON_UPDATE {
            self.data.remove(*field);
        }
    }
}

/// Company lookup strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStrategy {
    ExtId,
    Ico,
    TaxNumber,
    Name,
}

/// Person lookup strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonStrategy {
    ExtId,
    Email,
    Phone,
    Name,
}

/// A strategy slot in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySlot<S> {
    pub strategy: S,
    pub enabled: bool,
}

/// Strategy order and toggles per entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheckConfig {
    pub company: Vec<StrategySlot<CompanyStrategy>>,
    pub person: Vec<StrategySlot<PersonStrategy>>,
}

fn slot<S>(strategy: S, enabled: bool) -> StrategySlot<S> {
    StrategySlot { strategy, enabled }
}

impl Default for DuplicateCheckConfig {
    fn default() -> Self {
        Self {
            company: vec![
                slot(CompanyStrategy::ExtId, true),
                slot(CompanyStrategy::Ico, true),
                slot(CompanyStrategy::TaxNumber, false),
                slot(CompanyStrategy::Name, false),
            ],
            person: vec![
                slot(PersonStrategy::ExtId, true),
                slot(PersonStrategy::Email, true),
                slot(PersonStrategy::Phone, false),
                slot(PersonStrategy::Name, false),
            ],
        }
    }
}

fn toggle<S: PartialEq>(slots: &mut [StrategySlot<S>], strategy: S, enabled: bool) {
    for slot in slots.iter_mut().filter(|slot| slot.strategy == strategy) {
        slot.enabled = enabled;
    }
}

impl DuplicateCheckConfig {
    pub fn set_company(mut self, strategy: CompanyStrategy, enabled: bool) -> Self {
        toggle(&mut self.company, strategy, enabled);
        self
    }

    pub fn set_person(mut self, strategy: PersonStrategy, enabled: bool) -> Self {
        toggle(&mut self.person, strategy, enabled);
        self
    }

    /// Enables every strategy
    pub fn all_enabled() -> Self {
        let mut config = Self::default();
        config.company.iter_mut().for_each(|s| s.enabled = true);
        config.person.iter_mut().for_each(|s| s.enabled = true);
        config
    }

    pub fn enabled_company(&self) -> impl Iterator<Item = CompanyStrategy> + '_ {
        self.company.iter().filter(|s| s.enabled).map(|s| s.strategy)
    }

    pub fn enabled_person(&self) -> impl Iterator<Item = PersonStrategy> + '_ {
        self.person.iter().filter(|s| s.enabled).map(|s| s.strategy)
    }
}

/// Signals available for a company lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyCriteria {
    pub ico: Option<String>,
    pub tax_number: Option<String>,
    pub name: Option<String>,
}

impl CompanyCriteria {
    pub fn from_company(company: &Company) -> Self {
        Self {
            ico: company.reg_number.clone(),
            tax_number: company.tax_number.clone(),
            name: Some(company.name.clone()),
        }
    }
}

/// Signals available for a person lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonCriteria {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl PersonCriteria {
    pub fn from_person(person: &Person) -> Self {
        Self {
            email: person.email().map(str::to_string),
            phone: person.phone().map(str::to_string),
            first_name: person.first_name.clone(),
            last_name: Some(person.last_name.clone()),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Finds existing CRM records for incoming companies and persons
pub struct DuplicateChecker {
    companies: CrmRepository<Company>,
    persons: CrmRepository<Person>,
    config: DuplicateCheckConfig,
}

impl DuplicateChecker {
    pub fn new(crm: Arc<dyn CrmPort>, config: DuplicateCheckConfig) -> Self {
        Self {
            companies: CrmRepository::new(crm.clone()),
            persons: CrmRepository::new(crm),
            config,
        }
    }

    pub fn config(&self) -> &DuplicateCheckConfig {
        &self.config
    }

    /// Runs the enabled company strategies in order
    pub async fn find_existing_company(
        &self,
        external_id: Option<&str>,
        criteria: &CompanyCriteria,
    ) -> Option<MatchResult> {
        for strategy in self.config.enabled_company() {
            let outcome = match strategy {
                CompanyStrategy::ExtId => self.by_external_id(&self.companies, external_id).await,
                CompanyStrategy::Ico => match present(&criteria.ico) {
                    Some(ico) => {
                        self.first(&self.companies, Filters::new().eq("regNumber", normalize_ico(ico)), MatchedBy::Ico)
                            .await
                    }
                    None => Ok(None),
                },
                CompanyStrategy::TaxNumber => match present(&criteria.tax_number) {
                    Some(dic) => {
                        self.first(&self.companies, Filters::new().eq("taxNumber", dic), MatchedBy::TaxNumber)
                            .await
                    }
                    None => Ok(None),
                },
                CompanyStrategy::Name => match present(&criteria.name) {
                    Some(name) => self.company_by_name(name).await,
                    None => Ok(None),
                },
            };

            if let Some(found) = settle(Company::KIND.as_str(), &format!("{:?}", strategy), outcome) {
                return Some(found);
            }
        }
        None
    }

    /// Runs the enabled person strategies in order
    pub async fn find_existing_person(
        &self,
        external_id: Option<&str>,
        criteria: &PersonCriteria,
    ) -> Option<MatchResult> {
        for strategy in self.config.enabled_person() {
            let outcome = match strategy {
                PersonStrategy::ExtId => self.by_external_id(&self.persons, external_id).await,
                PersonStrategy::Email => match present(&criteria.email) {
                    Some(email) => {
                        self.first(
                            &self.persons,
                            Filters::new().eq("contactInfo.email", email.to_lowercase()),
                            MatchedBy::Email,
                        )
                        .await
                    }
                    None => Ok(None),
                },
                PersonStrategy::Phone => match present(&criteria.phone) {
                    Some(phone) => {
                        self.first(
                            &self.persons,
                            Filters::new().eq("contactInfo.tel1", normalize_phone(phone)),
                            MatchedBy::Phone,
                        )
                        .await
                    }
                    None => Ok(None),
                },
                PersonStrategy::Name => match (present(&criteria.first_name), present(&criteria.last_name)) {
                    (Some(first), Some(last)) => self.person_by_name(first, last).await,
                    _ => Ok(None),
                },
            };

            if let Some(found) = settle(Person::KIND.as_str(), &format!("{:?}", strategy), outcome) {
                return Some(found);
            }
        }
        None
    }

    async fn by_external_id<E: CrmEntity>(
        &self,
        repository: &CrmRepository<E>,
        external_id: Option<&str>,
    ) -> Result<Option<MatchResult>, CrmError> {
        let Some(external_id) = external_id.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(None);
        };
        Ok(repository
            .find_by_external_id(external_id)
            .await?
            .and_then(|record| MatchResult::from_record(record, MatchedBy::ExtId)))
    }

    async fn first<E: CrmEntity>(
        &self,
        repository: &CrmRepository<E>,
        filters: Filters,
        matched_by: MatchedBy,
    ) -> Result<Option<MatchResult>, CrmError> {
        Ok(repository
            .search(&filters, 1, 0)
            .await?
            .into_iter()
            .find_map(|record| MatchResult::from_record(record, matched_by)))
    }

    /// Prefers an exact case-insensitive name among the partial matches,
    /// otherwise takes the first partial match in CRM order
    async fn company_by_name(&self, name: &str) -> Result<Option<MatchResult>, CrmError> {
        let candidates = self
            .companies
            .search(&Filters::new().contains("name", name), NAME_CANDIDATE_LIMIT, 0)
            .await?;

        let wanted = name.to_lowercase();
        let exact = candidates.iter().position(|record| {
            record
                .get("name")
                .and_then(Value::as_str)
                .map(|n| n.trim().to_lowercase() == wanted)
                .unwrap_or(false)
        });

        Ok(match exact {
            Some(index) => candidates
                .into_iter()
                .nth(index)
                .and_then(|record| MatchResult::from_record(record, MatchedBy::NameExact)),
            None => candidates
                .into_iter()
                .find_map(|record| MatchResult::from_record(record, MatchedBy::NamePartial)),
        })
    }

    async fn person_by_name(&self, first: &str, last: &str) -> Result<Option<MatchResult>, CrmError> {
        let candidates = self
            .persons
            .search(
                &Filters::new().contains("lastName", last),
                NAME_CANDIDATE_LIMIT,
                0,
            )
            .await?;

        let field = |record: &Record<Person>, key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .map(|v| v.trim().to_lowercase())
                .unwrap_or_default()
        };
        let (first, last) = (first.to_lowercase(), last.to_lowercase());

        Ok(candidates
            .into_iter()
            .filter(|record| field(record, "firstName") == first && field(record, "lastName") == last)
            .find_map(|record| MatchResult::from_record(record, MatchedBy::Name)))
    }
}

/// Logs a strategy outcome; errors count as no match
fn settle(
    entity: &str,
    strategy: &str,
    outcome: Result<Option<MatchResult>, CrmError>,
) -> Option<MatchResult> {
    match outcome {
        Ok(Some(found)) => {
            info!(entity, strategy, crm_id = %found.id, matched_by = %found.matched_by, "duplicate found");
            Some(found)
        }
        Ok(None) => {
            debug!(entity, strategy, "no duplicate from strategy");
            None
        }
        Err(error) => {
            warn!(entity, strategy, %error, "duplicate lookup failed, trying next strategy");
            None
        }
    }
}
