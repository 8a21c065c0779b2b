//! Custom field mapper
//!
//! Bridges the static form catalog and the CRM's live custom-field
//! configuration: reads and caches that configuration, provisions missing
//! fields, recovers mappings for fields created by hand in the CRM, and turns
//! form data into the `customFields` payload of a record.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use core_kernel::{Clock, CrmError, CrmPort, EntityKind};

use crate::cache::{TtlCache, DEFAULT_CONFIG_TTL};
use crate::catalog::{self, DataType, FieldDefinition, MappingTarget, FIELD_GROUP_NAMESPACE};
use crate::format::{flatten, ValueFormatter};
use crate::mapping::FieldMapping;
use crate::translations::translate_or_keep;

/// Pause between consecutive field creations
pub const DEFAULT_CREATION_DELAY: Duration = Duration::from_millis(250);

const CONFIG_PATH: &str = "customField/config/";
const MIN_NAME_LENGTH: usize = 3;

/// A custom field as configured in the CRM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmCustomField {
    /// Technical name assigned by the CRM
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl CrmCustomField {
    /// True when the field sits in one of this application's groups
    pub fn in_namespace(&self) -> bool {
        self.group_name
            .as_deref()
            .map_or(false, |group| group.trim().starts_with(FIELD_GROUP_NAMESPACE))
    }
}

/// Live custom-field configuration per entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomFieldConfig {
    entities: BTreeMap<EntityKind, Vec<CrmCustomField>>,
}

impl CustomFieldConfig {
    /// Parses the `{ data: { Company: [..], Person: [..] } }` envelope
    pub fn from_response(body: &Value) -> Self {
        let mut entities = BTreeMap::new();
        for kind in [EntityKind::Company, EntityKind::Person] {
            let fields: Vec<CrmCustomField> = body
                .get("data")
                .and_then(|data| data.get(kind.as_str()))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| serde_json::from_value(item.clone()).ok())
                        .collect()
                })
                .unwrap_or_default();
            entities.insert(kind, fields);
        }
        Self { entities }
    }

    pub fn fields(&self, kind: EntityKind) -> &[CrmCustomField] {
        self.entities.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Case-insensitive label lookup
    pub fn find_by_label(&self, kind: EntityKind, label: &str) -> Option<&CrmCustomField> {
        let wanted = catalog::normalize_label(label);
        self.fields(kind)
            .iter()
            .find(|field| catalog::normalize_label(&field.label) == wanted)
    }

    pub fn find_by_name(&self, kind: EntityKind, name: &str) -> Option<&CrmCustomField> {
        self.fields(kind).iter().find(|field| field.name == name)
    }
}

/// Request to provision a custom field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomField {
    pub label: String,
    pub group_name: String,
    pub data_type: Option<DataType>,
    pub description: Option<String>,
    pub show_in_list_view: bool,
    pub show_in_filter_view: bool,
    pub enumeration_values: Vec<String>,
}

impl NewCustomField {
    pub fn new(label: impl Into<String>, group_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            label: label.into(),
            group_name: group_name.into(),
            data_type: Some(data_type),
            description: None,
            show_in_list_view: true,
            show_in_filter_view: true,
            enumeration_values: Vec::new(),
        }
    }

    /// Field request for a catalog entry, under its own group unless overridden
    pub fn from_definition(definition: &FieldDefinition, group_override: Option<&str>) -> Self {
        let group = group_override.unwrap_or_else(|| definition.group.name());
        let mut field = Self::new(definition.label, group, definition.data_type);
        field.enumeration_values = definition
            .options
            .iter()
            .map(|option| translate_or_keep(option))
            .collect();
        field
    }

    fn validate(&self) -> Result<DataType, CrmError> {
        if self.label.trim().chars().count() < MIN_NAME_LENGTH {
            return Err(CrmError::validation(format!(
                "custom field label must have at least {} characters",
                MIN_NAME_LENGTH
            )));
        }
        if self.group_name.trim().chars().count() < MIN_NAME_LENGTH {
            return Err(CrmError::validation(format!(
                "custom field group must have at least {} characters",
                MIN_NAME_LENGTH
            )));
        }
        self.data_type
            .ok_or_else(|| CrmError::validation("custom field data type is required"))
    }

    fn body(&self, data_type: DataType) -> Value {
        let mut body = json!({
            "label": self.label.trim(),
            "groupName": self.group_name.trim(),
            "dataType": data_type.as_str(),
            "showInListView": self.show_in_list_view,
            "showInFilterView": self.show_in_filter_view,
        });
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            body["description"] = json!(description);
        }
        if !self.enumeration_values.is_empty() {
            body["enumerationValues"] = json!(self.enumeration_values);
        }
        body
    }
}

/// A field created by `create_fields_from_form_mapping`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedField {
    pub form_key: String,
    pub label: String,
    pub field_name: String,
}

/// A key left alone because a field with its label already exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedField {
    pub form_key: String,
    pub label: String,
    pub existing_name: String,
}

/// A key whose field could not be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCreationError {
    pub form_key: String,
    pub message: String,
}

/// Outcome of a bulk field creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCreationReport {
    pub created: Vec<CreatedField>,
    pub skipped: Vec<SkippedField>,
    pub errors: Vec<FieldCreationError>,
}

impl FieldCreationReport {
    /// Mapping for every key that now has a CRM field, created or pre-existing
    pub fn mapping(&self) -> FieldMapping {
        self.created
            .iter()
            .map(|c| (c.form_key.clone(), c.field_name.clone()))
            .chain(
                self.skipped
                    .iter()
                    .map(|s| (s.form_key.clone(), s.existing_name.clone())),
            )
            .collect()
    }
}

/// A CRM field matched back to a form key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedField {
    pub form_key: String,
    pub field_name: String,
    pub label: String,
}

/// Result of matching existing CRM fields against the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedMapping {
    pub matched: Vec<DetectedField>,
    /// Fields in this application's groups with no catalog counterpart
    pub unmatched: Vec<CrmCustomField>,
    pub mapping: FieldMapping,
}

/// Custom-field catalog, provisioning and payload building
pub struct CustomFieldMapper {
    crm: Arc<dyn CrmPort>,
    clock: Arc<dyn Clock>,
    cache: TtlCache<CustomFieldConfig>,
    formatter: ValueFormatter,
    creation_delay: Duration,
}

impl CustomFieldMapper {
    pub fn new(crm: Arc<dyn CrmPort>, clock: Arc<dyn Clock>) -> Self {
        Self {
            crm,
            cache: TtlCache::new(clock.clone(), DEFAULT_CONFIG_TTL),
            clock,
            formatter: ValueFormatter::default(),
            creation_delay: DEFAULT_CREATION_DELAY,
        }
    }

    pub fn with_cache(mut self, cache: TtlCache<CustomFieldConfig>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = TtlCache::new(self.clock.clone(), ttl);
        self
    }

    /// Base URL for relative file paths in `FILE_LINKS` values
    pub fn with_file_base_url(mut self, base_url: Option<String>) -> Self {
        self.formatter = ValueFormatter::new(base_url);
        self
    }

    pub fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = delay;
        self
    }

    pub fn formatter(&self) -> &ValueFormatter {
        &self.formatter
    }

    /// Live custom-field configuration, served from cache within the TTL
    pub async fn get_config(&self, force_refresh: bool) -> Result<CustomFieldConfig, CrmError> {
        if !force_refresh {
            if let Some(config) = self.cache.get() {
                debug!("custom field config served from cache");
                return Ok(config);
            }
        }

        let config = match self.crm.get(CONFIG_PATH, &[]).await? {
            Some(body) => CustomFieldConfig::from_response(&body),
            None => CustomFieldConfig::default(),
        };
        debug!(
            company_fields = config.fields(EntityKind::Company).len(),
            person_fields = config.fields(EntityKind::Person).len(),
            "custom field config loaded"
        );
        self.cache.set(config.clone());
        Ok(config)
    }

    /// Provisions a field and returns its technical name
    pub async fn create_field(&self, kind: EntityKind, field: &NewCustomField) -> Result<String, CrmError> {
        let requested = field.validate()?;
        let data_type = requested.provisioned_as();
        if data_type != requested {
            warn!(label = %field.label, %requested, substituted = %data_type, "data type not supported for custom fields, substituting");
        }

        let path = format!("{}{}/", CONFIG_PATH, kind.as_str());
        let response = self.crm.put(&path, &field.body(data_type)).await?;
        self.cache.invalidate();

        let name = response
            .get("data")
            .and_then(|data| data.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CrmError::transformation("custom field response carries no name"))?;

        info!(entity = %kind, label = %field.label, field_name = %name, "custom field created");
        Ok(name)
    }

    /// Removes a field; false when the CRM did not know it
    pub async fn delete_field(&self, kind: EntityKind, field_name: &str) -> Result<bool, CrmError> {
        let field_name = field_name.trim();
        if field_name.is_empty() {
            return Err(CrmError::validation("custom field name is required"));
        }

        let path = format!("{}{}/{}/", CONFIG_PATH, kind.as_str(), field_name);
        let deleted = self.crm.delete(&path).await?;
        self.cache.invalidate();
        info!(entity = %kind, field_name, deleted, "custom field deleted");
        Ok(deleted)
    }

    /// Creates CRM fields for the given form keys
    ///
    /// Keys whose label already exists (case-insensitive) are reported under
    /// `skipped`; failures are collected per key and do not stop the run.
    pub async fn create_fields_from_form_mapping<S: AsRef<str>>(
        &self,
        kind: EntityKind,
        form_keys: &[S],
        group_override: Option<&str>,
    ) -> Result<FieldCreationReport, CrmError> {
        let config = self.get_config(false).await?;
        let mut report = FieldCreationReport::default();
        let mut seen_labels: HashSet<String> = HashSet::new();
        let mut first_creation = true;

        for key in form_keys {
            let key = key.as_ref();
            let Some(definition) = catalog::definition(key).filter(|d| d.key == key) else {
                report.errors.push(FieldCreationError {
                    form_key: key.to_string(),
                    message: "no field definition for this key".to_string(),
                });
                continue;
            };

            if let Some(existing) = config.find_by_label(kind, definition.label) {
                report.skipped.push(SkippedField {
                    form_key: key.to_string(),
                    label: definition.label.to_string(),
                    existing_name: existing.name.clone(),
                });
                continue;
            }
            let normalized = catalog::normalize_label(definition.label);
            if !seen_labels.insert(normalized.clone()) {
                match report
                    .created
                    .iter()
                    .find(|c| catalog::normalize_label(&c.label) == normalized)
                {
                    Some(created) => report.skipped.push(SkippedField {
                        form_key: key.to_string(),
                        label: definition.label.to_string(),
                        existing_name: created.field_name.clone(),
                    }),
                    None => report.errors.push(FieldCreationError {
                        form_key: key.to_string(),
                        message: "field with this label already failed in this run".to_string(),
                    }),
                }
                continue;
            }

            if !first_creation {
                self.clock.sleep(self.creation_delay).await;
            }
            first_creation = false;

            let request = NewCustomField::from_definition(definition, group_override);
            match self.create_field(kind, &request).await {
                Ok(field_name) => report.created.push(CreatedField {
                    form_key: key.to_string(),
                    label: definition.label.to_string(),
                    field_name,
                }),
                Err(error) => {
                    warn!(form_key = key, %error, "custom field creation failed");
                    report.errors.push(FieldCreationError {
                        form_key: key.to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }

        info!(
            entity = %kind,
            created = report.created.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "custom field provisioning finished"
        );
        Ok(report)
    }

    /// `customFields` payload for a record
    ///
    /// Only keys classified as custom are applied. Unparseable numeric values
    /// are sent as `null`; other values that format to nothing are left out.
    /// Pure: no I/O and the same input always yields the same output.
    pub fn build_custom_fields_payload(
        &self,
        form_data: &Map<String, Value>,
        mapping: &FieldMapping,
    ) -> Map<String, Value> {
        let flat = flatten(form_data);
        let mut payload = Map::new();

        for (form_key, crm_field) in mapping.iter() {
            if catalog::target(form_key) != MappingTarget::Custom || crm_field.trim().is_empty() {
                continue;
            }
            let Some(value) = flat.get(form_key) else {
                continue;
            };
            if is_blank(value) {
                continue;
            }

            let data_type = catalog::data_type(form_key);
            let formatted = self.formatter.format(value, data_type);
            if !formatted.is_null() || data_type.is_numeric() {
                payload.insert(crm_field.to_string(), formatted);
            }
        }
        payload
    }

    /// Maps fields in this application's groups back to form keys by label
    pub async fn detect_mapping_from_existing_fields(
        &self,
        kind: EntityKind,
    ) -> Result<DetectedMapping, CrmError> {
        let config = self.get_config(false).await?;
        let mut detected = DetectedMapping::default();

        for field in config.fields(kind).iter().filter(|f| f.in_namespace()) {
            match catalog::definition_by_label(&field.label) {
                Some(definition) => {
                    detected.mapping.insert(definition.key, field.name.clone());
                    detected.matched.push(DetectedField {
                        form_key: definition.key.to_string(),
                        field_name: field.name.clone(),
                        label: field.label.clone(),
                    });
                }
                None => detected.unmatched.push(field.clone()),
            }
        }

        info!(
            entity = %kind,
            matched = detected.matched.len(),
            unmatched = detected.unmatched.len(),
            "custom field mapping detected"
        );
        Ok(detected)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
