//! Ports and Adapters Infrastructure
//!
//! The domain crates never talk HTTP directly. They depend on `CrmPort`, a
//! thin JSON-over-paths seam that the `infra_crm` client implements against the
//! real CRM and that `mock::MockCrm` implements in memory for tests.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Sync Orchestrator                          │
//! │        (domain_sync: company / person / contact flow)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │     Entity Model · Duplicate Checker · Custom Field Mapper   │
//! │            (domain_crm, domain_fields)                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CrmPort                               │
//! └─────────────────────────────────────────────────────────────┘
//!                    ▲                         ▲
//!         ┌─────────┴─────────┐     ┌────────┴────────┐
//!         │  CrmClient        │     │  MockCrm         │
//!         │  (reqwest, REST)  │     │  (in memory)     │
//!         └───────────────────┘     └──────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CrmError;

/// Query string pairs, kept ordered so requests are reproducible
pub type QueryParams = Vec<(String, String)>;

/// Marker trait for all ports
///
/// All port traits extend this marker so they can be shared across tasks.
pub trait DomainPort: Send + Sync + 'static {}

/// Last rate-limit figures reported by the CRM
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Requests left in the current window
    pub remaining: Option<u32>,
    /// Seconds (or epoch, as reported by the CRM) until the window resets
    pub reset: Option<u64>,
}

/// Wire-level access to the CRM REST API
///
/// Paths are relative to the API root (e.g. `company/123/`). Bodies are the
/// CRM's JSON envelopes, returned untouched.
#[async_trait]
pub trait CrmPort: DomainPort {
    /// True when credentials are present and not the documented placeholder
    fn is_configured(&self) -> bool;

    /// Reads a resource; a 404 yields `Ok(None)`
    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Option<Value>, CrmError>;

    /// Creates a resource
    async fn put(&self, path: &str, body: &Value) -> Result<Value, CrmError>;

    /// Updates a resource
    async fn post(&self, path: &str, body: &Value) -> Result<Value, CrmError>;

    /// Deletes a resource; returns false when it did not exist
    async fn delete(&self, path: &str) -> Result<bool, CrmError>;

    /// Rate-limit figures from the most recent response
    fn rate_limit(&self) -> RateLimitSnapshot;
}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    /// Adapter is healthy and operational
    Healthy,
    /// Adapter is degraded but operational
    Degraded,
    /// Adapter is unhealthy and not operational
    Unhealthy,
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Adapter identifier
    pub adapter_id: String,
    /// Current health status
    pub status: AdapterHealth,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
    /// Optional message with additional details
    pub message: Option<String>,
    /// Rate-limit figures seen during the check
    pub rate_limit: RateLimitSnapshot,
    /// Timestamp of the health check
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

/// Trait for adapters that support health checks
#[async_trait]
pub trait HealthCheckable: Send + Sync {
    /// Performs a health check on the adapter
    async fn health_check(&self) -> HealthCheckResult;
}

/// In-memory CRM for testing
///
/// Understands the subset of the REST API the sync engine uses: entity CRUD,
/// `ext/<id>` lookups, filtered listing, person relationships and the
/// custom-field configuration endpoints. Every request is recorded and
/// failures can be injected per method and path prefix.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use serde_json::{json, Map};
    use std::collections::BTreeMap;
    use tokio::sync::RwLock;

    use crate::identifiers::CrmId;

    /// A request as the mock received it
    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedRequest {
        pub method: &'static str,
        pub path: String,
        pub params: QueryParams,
        pub body: Option<Value>,
    }

    #[derive(Debug, Clone)]
    struct FailureRule {
        method: &'static str,
        path_prefix: String,
        status_code: u16,
        message: String,
        times: Option<usize>,
    }

    #[derive(Debug, Default)]
    struct MockState {
        collections: BTreeMap<String, BTreeMap<i64, Map<String, Value>>>,
        custom_fields: BTreeMap<String, Vec<Value>>,
        next_id: i64,
        next_field: u32,
        requests: Vec<RecordedRequest>,
        failures: Vec<FailureRule>,
    }

    impl MockState {
        fn allocate_id(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }

        fn check_failure(&mut self, method: &str, path: &str) -> Result<(), CrmError> {
            let position = self.failures.iter().position(|rule| {
                (rule.method == "*" || rule.method == method) && path.starts_with(&rule.path_prefix)
            });
            let Some(position) = position else {
                return Ok(());
            };

            let rule = self.failures[position].clone();
            if let Some(times) = rule.times {
                if times <= 1 {
                    self.failures.remove(position);
                } else {
                    self.failures[position].times = Some(times - 1);
                }
            }

            if rule.status_code == 429 {
                return Err(CrmError::RateLimited {
                    remaining: Some(0),
                    reset: None,
                });
            }
            Err(CrmError::api(rule.status_code, rule.message))
        }
    }

    /// In-memory implementation of `CrmPort`
    #[derive(Debug)]
    pub struct MockCrm {
        state: RwLock<MockState>,
        configured: bool,
    }

    impl Default for MockCrm {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockCrm {
        /// Creates an empty, configured mock
        pub fn new() -> Self {
            Self {
                state: RwLock::new(MockState {
                    next_id: 1000,
                    ..Default::default()
                }),
                configured: true,
            }
        }

        /// Creates a mock that reports missing credentials
        pub fn unconfigured() -> Self {
            Self {
                configured: false,
                ..Self::new()
            }
        }

        /// Seeds a record into an endpoint collection and returns its id
        pub async fn insert(&self, endpoint: &str, record: Value) -> CrmId {
            let mut state = self.state.write().await;
            let id = state.allocate_id();
            let mut data = match record {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            data.insert("id".to_string(), json!(id));
            state
                .collections
                .entry(endpoint.trim_matches('/').to_string())
                .or_default()
                .insert(id, data);
            CrmId::new(id)
        }

        /// Returns a stored record
        pub async fn record(&self, endpoint: &str, id: CrmId) -> Option<Value> {
            self.state
                .read()
                .await
                .collections
                .get(endpoint.trim_matches('/'))
                .and_then(|records| records.get(&id.value()))
                .map(|data| Value::Object(data.clone()))
        }

        /// Returns all records of an endpoint in id order
        pub async fn records(&self, endpoint: &str) -> Vec<Value> {
            self.state
                .read()
                .await
                .collections
                .get(endpoint.trim_matches('/'))
                .map(|records| records.values().cloned().map(Value::Object).collect())
                .unwrap_or_default()
        }

        /// Seeds a custom-field definition for an entity (`Company`, `Person`)
        pub async fn add_custom_field(&self, entity: &str, field: Value) {
            self.state
                .write()
                .await
                .custom_fields
                .entry(entity.to_string())
                .or_default()
                .push(field);
        }

        /// Returns the custom-field definitions of an entity
        pub async fn custom_fields(&self, entity: &str) -> Vec<Value> {
            self.state
                .read()
                .await
                .custom_fields
                .get(entity)
                .cloned()
                .unwrap_or_default()
        }

        /// Makes every matching request fail with the given status
        ///
        /// `method` is `GET`, `PUT`, `POST`, `DELETE` or `*`. A 429 status
        /// surfaces as `CrmError::RateLimited`.
        pub async fn fail_on(&self, method: &'static str, path_prefix: &str, status_code: u16, message: &str) {
            self.push_failure(method, path_prefix, status_code, message, None).await;
        }

        /// Makes the next `times` matching requests fail
        pub async fn fail_times(
            &self,
            method: &'static str,
            path_prefix: &str,
            status_code: u16,
            message: &str,
            times: usize,
        ) {
            self.push_failure(method, path_prefix, status_code, message, Some(times)).await;
        }

        async fn push_failure(
            &self,
            method: &'static str,
            path_prefix: &str,
            status_code: u16,
            message: &str,
            times: Option<usize>,
        ) {
            self.state.write().await.failures.push(FailureRule {
                method,
                path_prefix: path_prefix.trim_start_matches('/').to_string(),
                status_code,
                message: message.to_string(),
                times,
            });
        }

        /// All requests received so far
        pub async fn requests(&self) -> Vec<RecordedRequest> {
            self.state.read().await.requests.clone()
        }

        /// Requests with the given method whose path starts with `path_prefix`
        pub async fn requests_matching(&self, method: &str, path_prefix: &str) -> Vec<RecordedRequest> {
            let prefix = path_prefix.trim_start_matches('/');
            self.state
                .read()
                .await
                .requests
                .iter()
                .filter(|r| r.method == method && r.path.starts_with(prefix))
                .cloned()
                .collect()
        }

        /// Forgets recorded requests
        pub async fn clear_requests(&self) {
            self.state.write().await.requests.clear();
        }

        async fn begin(
            &self,
            method: &'static str,
            path: &str,
            params: &[(String, String)],
            body: Option<&Value>,
        ) -> Result<(), CrmError> {
            let mut state = self.state.write().await;
            let path = path.trim_start_matches('/').to_string();
            state.requests.push(RecordedRequest {
                method,
                path: path.clone(),
                params: params.to_vec(),
                body: body.cloned(),
            });
            state.check_failure(method, &path)
        }
    }

    fn segments(path: &str) -> Vec<String> {
        path.trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn envelope(data: Value) -> Value {
        json!({ "success": true, "data": data })
    }

    fn scalar_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.to_lowercase()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Collects the values at a dotted path, descending into arrays
    fn lookup<'a>(value: &'a Value, path: &[&str], out: &mut Vec<&'a Value>) {
        match value {
            Value::Array(items) => {
                for item in items {
                    lookup(item, path, out);
                }
            }
            Value::Object(map) => {
                if let Some((head, rest)) = path.split_first() {
                    if let Some(next) = map.get(*head) {
                        lookup(next, rest, out);
                    }
                } else {
                    out.push(value);
                }
            }
            other => {
                if path.is_empty() {
                    out.push(other);
                }
            }
        }
    }

    fn like(candidate: &str, pattern: &str) -> bool {
        let pattern = pattern.to_lowercase();
        let starts = pattern.starts_with('%');
        let ends = pattern.ends_with('%') && pattern.len() > 1;
        let core = pattern.trim_matches('%');
        match (starts, ends) {
            (true, true) => candidate.contains(core),
            (true, false) => candidate.ends_with(core),
            (false, true) => candidate.starts_with(core),
            (false, false) => candidate == core,
        }
    }

    fn compare(candidate: &str, expected: &str) -> Option<std::cmp::Ordering> {
        let a: f64 = candidate.parse().ok()?;
        let b: f64 = expected.parse().ok()?;
        a.partial_cmp(&b)
    }

    fn matches_filter(record: &Value, key: &str, expected: &str) -> bool {
        let Some(open) = key.find('[') else {
            return true;
        };
        let field = &key[..open];
        let operator = key[open + 1..].trim_end_matches(']');
        let path: Vec<&str> = field.split('.').collect();

        let mut found = Vec::new();
        lookup(record, &path, &mut found);
        let candidates: Vec<String> = found.into_iter().filter_map(scalar_text).collect();
        let expected_lower = expected.to_lowercase();

        match operator {
            "EQ" => candidates.iter().any(|c| *c == expected_lower),
            "NE" => candidates.iter().all(|c| *c != expected_lower),
            "LIKE" => candidates.iter().any(|c| like(c, expected)),
            "NOT_LIKE" => candidates.iter().all(|c| !like(c, expected)),
            "IN" => {
                let options: Vec<String> =
                    expected.split(',').map(|o| o.trim().to_lowercase()).collect();
                candidates.iter().any(|c| options.contains(c))
            }
            "GT" => candidates.iter().any(|c| compare(c, expected) == Some(std::cmp::Ordering::Greater)),
            "GE" => candidates
                .iter()
                .any(|c| matches!(compare(c, expected), Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal))),
            "LT" => candidates.iter().any(|c| compare(c, expected) == Some(std::cmp::Ordering::Less)),
            "LE" => candidates
                .iter()
                .any(|c| matches!(compare(c, expected), Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal))),
            _ => false,
        }
    }

    impl DomainPort for MockCrm {}

    #[async_trait]
    impl HealthCheckable for MockCrm {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-crm".to_string(),
                status: if self.configured {
                    AdapterHealth::Healthy
                } else {
                    AdapterHealth::Unhealthy
                },
                latency_ms: 0,
                message: Some("Mock adapter".to_string()),
                rate_limit: RateLimitSnapshot::default(),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl CrmPort for MockCrm {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Option<Value>, CrmError> {
            self.begin("GET", path, params, None).await?;
            let state = self.state.read().await;
            let parts = segments(path);
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

            match parts.as_slice() {
                ["customField", "config"] => {
                    let data: Map<String, Value> = state
                        .custom_fields
                        .iter()
                        .map(|(entity, fields)| (entity.clone(), Value::Array(fields.clone())))
                        .collect();
                    Ok(Some(envelope(Value::Object(data))))
                }
                [endpoint] => {
                    let mut limit = usize::MAX;
                    let mut offset = 0usize;
                    let mut filters = Vec::new();
                    for (key, value) in params {
                        match key.as_str() {
                            "limit" => limit = value.parse().unwrap_or(usize::MAX),
                            "offset" => offset = value.parse().unwrap_or(0),
                            _ => filters.push((key.as_str(), value.as_str())),
                        }
                    }
                    let all: Vec<Value> = state
                        .collections
                        .get(*endpoint)
                        .map(|records| records.values().cloned().map(Value::Object).collect())
                        .unwrap_or_default();
                    let matching: Vec<Value> = all
                        .into_iter()
                        .filter(|record| filters.iter().all(|(k, v)| matches_filter(record, k, v)))
                        .collect();
                    let total = matching.len();
                    let page: Vec<Value> = matching.into_iter().skip(offset).take(limit).collect();
                    Ok(Some(json!({ "success": true, "totalCount": total, "data": page })))
                }
                [endpoint, "ext", external_id] => Ok(state
                    .collections
                    .get(*endpoint)
                    .and_then(|records| {
                        records.values().find(|data| {
                            data.get("extIds")
                                .and_then(Value::as_array)
                                .map(|ids| ids.iter().any(|id| id.as_str() == Some(*external_id)))
                                .unwrap_or(false)
                        })
                    })
                    .map(|data| envelope(Value::Object(data.clone())))),
                [endpoint, id] => {
                    let Ok(id) = id.parse::<i64>() else {
                        return Ok(None);
                    };
                    Ok(state
                        .collections
                        .get(*endpoint)
                        .and_then(|records| records.get(&id))
                        .map(|data| envelope(Value::Object(data.clone()))))
                }
                _ => Ok(None),
            }
        }

        async fn put(&self, path: &str, body: &Value) -> Result<Value, CrmError> {
            self.begin("PUT", path, &[], Some(body)).await?;
            let mut state = self.state.write().await;
            let parts = segments(path);
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

            match parts.as_slice() {
                ["customField", "config", entity] => {
                    state.next_field += 1;
                    let name = format!("{}_cf_{}", entity.to_lowercase(), state.next_field);
                    let mut field = body.as_object().cloned().unwrap_or_default();
                    field.insert("name".to_string(), json!(name));
                    state
                        .custom_fields
                        .entry((*entity).to_string())
                        .or_default()
                        .push(Value::Object(field));
                    Ok(envelope(json!({ "name": name })))
                }
                [endpoint, id, "relationship"] => {
                    let id: i64 = id
                        .parse()
                        .map_err(|_| CrmError::api(400, format!("invalid id {}", id)))?;
                    let record = state
                        .collections
                        .get_mut(*endpoint)
                        .and_then(|records| records.get_mut(&id))
                        .ok_or_else(|| CrmError::api(404, format!("{} {} not found", endpoint, id)))?;
                    let link = json!({
                        "company": { "id": body.get("company").cloned().unwrap_or(Value::Null) },
                        "type": body.get("type").cloned().unwrap_or(Value::Null),
                    });
                    match record.get_mut("relationships").and_then(Value::as_array_mut) {
                        Some(links) => links.push(link),
                        None => {
                            record.insert("relationships".to_string(), json!([link]));
                        }
                    }
                    Ok(json!({ "success": true }))
                }
                [endpoint] => {
                    let mut data = body
                        .as_object()
                        .cloned()
                        .ok_or_else(|| CrmError::api(400, "request body must be an object"))?;
                    let id = state.allocate_id();
                    data.insert("id".to_string(), json!(id));
                    state
                        .collections
                        .entry((*endpoint).to_string())
                        .or_default()
                        .insert(id, data);
                    Ok(envelope(json!({ "id": id })))
                }
                _ => Err(CrmError::api(404, format!("unknown resource {}", path))),
            }
        }

        async fn post(&self, path: &str, body: &Value) -> Result<Value, CrmError> {
            self.begin("POST", path, &[], Some(body)).await?;
            let mut state = self.state.write().await;
            let parts = segments(path);
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

            match parts.as_slice() {
                [endpoint, id] => {
                    let id: i64 = id
                        .parse()
                        .map_err(|_| CrmError::api(400, format!("invalid id {}", id)))?;
                    let record = state
                        .collections
                        .get_mut(*endpoint)
                        .and_then(|records| records.get_mut(&id))
                        .ok_or_else(|| CrmError::api(404, format!("{} {} not found", endpoint, id)))?;
                    if let Some(fields) = body.as_object() {
                        for (key, value) in fields {
                            if key != "id" {
                                record.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    Ok(json!({ "success": true }))
                }
                _ => Err(CrmError::api(404, format!("unknown resource {}", path))),
            }
        }

        async fn delete(&self, path: &str) -> Result<bool, CrmError> {
            self.begin("DELETE", path, &[], None).await?;
            let mut state = self.state.write().await;
            let parts = segments(path);
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

            match parts.as_slice() {
                ["customField", "config", entity, name] => {
                    let Some(fields) = state.custom_fields.get_mut(*entity) else {
                        return Ok(false);
                    };
                    let before = fields.len();
                    fields.retain(|f| f.get("name").and_then(Value::as_str) != Some(*name));
                    Ok(fields.len() < before)
                }
                [endpoint, id] => {
                    let Ok(id) = id.parse::<i64>() else {
                        return Ok(false);
                    };
                    Ok(state
                        .collections
                        .get_mut(*endpoint)
                        .and_then(|records| records.remove(&id))
                        .is_some())
                }
                _ => Ok(false),
            }
        }

        fn rate_limit(&self) -> RateLimitSnapshot {
            RateLimitSnapshot::default()
        }
    }
}
