//! CRM entity abstraction
//!
//! `CrmEntity` is implemented by the typed values (`Company`, `Person`) and
//! carries the per-entity constants. `Record<E>` is the transient, untyped
//! view the repository reads and writes: an optional CRM id, an optional
//! external id and the ordered field map.

use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

use core_kernel::{CrmId, EntityKind, FormId};

/// A CRM entity type
pub trait CrmEntity: Sized + Send + Sync + 'static {
    /// Entity kind, also the name used in custom-field configuration paths
    const KIND: EntityKind;

    /// REST collection, without slashes (e.g. `company`)
    const ENDPOINT: &'static str;

    /// Fields that must be present and non-empty before a create
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Prefix of external ids minted for this entity
    const EXT_ID_PREFIX: &'static str;

    /// Fields never sent when updating a record that already exists in the CRM
    const PRESERVED_ON_UPDATE: &'static [&'static str] = &[];

    /// Builds the entity from a raw form payload
    fn from_source(source: &Map<String, Value>, form_id: FormId) -> Self;

    /// Converts the entity into the CRM field map
    fn to_fields(&self) -> Map<String, Value>;

    /// External id correlating `form_id` with a record of this entity
    fn external_id_for(form_id: FormId) -> String {
        format!("{}:{}", Self::EXT_ID_PREFIX, form_id)
    }
}

/// True for null, blank strings and empty arrays/objects
///
/// `0` and `false` are values, not absences.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Transient CRM record of entity type `E`
pub struct Record<E: CrmEntity> {
    /// CRM-assigned id; `None` until created or matched
    pub id: Option<CrmId>,
    /// External id sent with the next write; `None` leaves the CRM's list untouched
    pub external_id: Option<String>,
    /// Field map in insertion order
    pub data: Map<String, Value>,
    known_ext_ids: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: CrmEntity> Clone for Record<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            external_id: self.external_id.clone(),
            data: self.data.clone(),
            known_ext_ids: self.known_ext_ids.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: CrmEntity> fmt::Debug for Record<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("kind", &E::KIND)
            .field("id", &self.id)
            .field("external_id", &self.external_id)
            .field("data", &self.data)
            .finish()
    }
}

impl<E: CrmEntity> Default for Record<E> {
    fn default() -> Self {
        Self::new(Map::new())
    }
}

impl<E: CrmEntity> Record<E> {
    /// Creates an unsaved record from a field map
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            id: None,
            external_id: None,
            data,
            known_ext_ids: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Creates an unsaved record from a typed entity
    pub fn from_entity(entity: &E, external_id: Option<String>) -> Self {
        let mut record = Self::new(entity.to_fields());
        record.external_id = external_id;
        record
    }

    /// Transforms a raw form payload and tags it with the form's external id
    pub fn from_source(source: &Map<String, Value>, form_id: FormId) -> Self {
        Self::from_entity(&E::from_source(source, form_id), Some(E::external_id_for(form_id)))
    }

    /// Builds a record from a CRM response object
    pub fn hydrate(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let mut record = Self::new(map.clone());
        record.id = map.get("id").and_then(CrmId::from_json);
        record.known_ext_ids = ext_ids_of(value);
        record.external_id = record
            .known_ext_ids
            .iter()
            .find(|ext| ext.starts_with(&format!("{}:", E::EXT_ID_PREFIX)))
            .cloned();
        Some(record)
    }

    /// Takes over the identity of an existing CRM record
    ///
    /// External ids already stored on that record are kept in the next payload.
    pub fn adopt(&mut self, id: CrmId, existing: &Value) {
        self.id = Some(id);
        self.known_ext_ids = ext_ids_of(existing);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.data.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.data.remove(field)
    }

    /// External ids the CRM already holds for this record
    pub fn known_external_ids(&self) -> &[String] {
        &self.known_ext_ids
    }

    /// Required fields that are absent or empty, in declaration order
    pub fn missing_required_fields(&self) -> Vec<String> {
        E::REQUIRED_FIELDS
            .iter()
            .filter(|field| self.data.get(**field).map_or(true, is_empty_value))
            .map(|field| field.to_string())
            .collect()
    }

    /// Request body for a create or update
    pub fn payload(&self) -> Value {
        let mut body = self.data.clone();
        body.remove("id");
        body.remove("extIds");
        if let Some(external_id) = &self.external_id {
            let mut ext_ids = self.known_ext_ids.clone();
            if !ext_ids.contains(external_id) {
                ext_ids.push(external_id.clone());
            }
            body.insert(
                "extIds".to_string(),
                Value::Array(ext_ids.into_iter().map(Value::String).collect()),
            );
        }
        Value::Object(body)
    }
}

fn ext_ids_of(value: &Value) -> Vec<String> {
    value
        .get("extIds")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
