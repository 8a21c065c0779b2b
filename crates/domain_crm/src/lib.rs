//! CRM Entity Domain
//!
//! Typed Company and Person values, the generic record/repository layer that
//! reads and writes them through `CrmPort`, and the strategy-ordered duplicate
//! checker used by smart sync.
//!
//! # Examples
//!
//! ```rust
//! use domain_crm::{Company, CrmEntity, Record};
//! use core_kernel::FormId;
//! use serde_json::json;
//!
//! let source = json!({ "companyName": "Alfa Stavby s.r.o.", "ico": "12345678" });
//! let record = Record::<Company>::from_source(source.as_object().unwrap(), FormId::new(7));
//!
//! assert_eq!(record.external_id.as_deref(), Some("webform-company:7"));
//! assert!(record.missing_required_fields().is_empty());
//! ```

pub mod company;
pub mod contact;
pub mod duplicate;
pub mod entity;
pub mod filters;
pub mod person;
pub mod phone;
pub mod repository;
pub mod source;

pub use company::{Company, CompanyRole, CompanyState, Rating};
pub use contact::{Address, CompanyAddress, ContactInfo};
pub use duplicate::{
    CompanyCriteria, CompanyStrategy, DuplicateCheckConfig, DuplicateChecker, MatchResult,
    MatchedBy, PersonCriteria, PersonStrategy, StrategySlot,
};
pub use entity::{is_empty_value, CrmEntity, Record};
pub use filters::{Filter, FilterOperator, Filters};
pub use person::{additional_contact_external_id, split_name, Person};
pub use phone::normalize_phone;
pub use repository::CrmRepository;
