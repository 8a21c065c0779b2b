//! Custom Field Domain
//!
//! The intake form evolves faster than the CRM schema. This crate keeps the
//! static description of every form field, provisions matching CRM custom
//! fields on demand, and converts submitted values into the representation
//! each CRM data type expects.
//!
//! - `catalog`: field definitions and auto-mapping rules
//! - `translations`: localized labels for option keys
//! - `format`: flattening and per-type value coercion
//! - `cache`: TTL cache for the CRM's field configuration
//! - `mapper`: `CustomFieldMapper`, the CRM-facing half

pub mod cache;
pub mod catalog;
pub mod format;
pub mod mapper;
pub mod mapping;
pub mod translations;

pub use cache::{TtlCache, DEFAULT_CONFIG_TTL};
pub use catalog::{
    AutoMappingRule, DataType, FieldDefinition, FieldGroup, MappingTarget, AUTO_MAPPING,
    FIELD_DEFINITIONS, FIELD_GROUP_NAMESPACE,
};
pub use format::{flatten, format_value, ValueFormatter};
pub use mapper::{
    CreatedField, CrmCustomField, CustomFieldConfig, CustomFieldMapper, DetectedField,
    DetectedMapping, FieldCreationError, FieldCreationReport, NewCustomField, SkippedField,
    DEFAULT_CREATION_DELAY,
};
pub use mapping::FieldMapping;
pub use translations::translate;
