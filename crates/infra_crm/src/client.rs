//! CRM REST client
//!
//! Requests are sent one at a time; a rate-limited request blocks its caller
//! for `retry_delay` (through the injected clock) before it is retried.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, ACCEPT};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use core_kernel::{
    AdapterHealth, Clock, CrmError, CrmPort, DomainPort, HealthCheckResult, HealthCheckable,
    RateLimitSnapshot, SystemClock,
};

use crate::config::CrmConfig;

const INSTANCE_HEADER: &str = "X-Instance-Name";
const RATE_LIMIT_REMAINING_HEADER: &str = "X-Ratelimit-Remaining";
const RATE_LIMIT_RESET_HEADER: &str = "X-Ratelimit-Reset";
const UNKNOWN: i64 = -1;

/// Classified response of a single logical request
enum Outcome {
    Body(Value),
    NotFound(String),
}

/// HTTP client for the CRM REST API
pub struct CrmClient {
    http: reqwest::Client,
    config: CrmConfig,
    clock: Arc<dyn Clock>,
    remaining: AtomicI64,
    reset: AtomicI64,
}

impl std::fmt::Debug for CrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmClient")
            .field("config", &self.config)
            .field("rate_limit", &self.rate_limit_snapshot())
            .finish()
    }
}

impl CrmClient {
    /// Creates a client that sleeps on the real clock
    pub fn new(config: CrmConfig) -> Result<Self, CrmError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a client whose retry sleeps go through `clock`
    pub fn with_clock(config: CrmConfig, clock: Arc<dyn Clock>) -> Result<Self, CrmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| CrmError::configuration(format!("cannot build HTTP client: {}", err)))?;

        Ok(Self {
            http,
            config,
            clock,
            remaining: AtomicI64::new(UNKNOWN),
            reset: AtomicI64::new(UNKNOWN),
        })
    }

    pub fn config(&self) -> &CrmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn rate_limit_snapshot(&self) -> RateLimitSnapshot {
        let remaining = self.remaining.load(Ordering::Relaxed);
        let reset = self.reset.load(Ordering::Relaxed);
        RateLimitSnapshot {
            remaining: u32::try_from(remaining).ok(),
            reset: u64::try_from(reset).ok(),
        }
    }

    fn record_rate_limit(&self, headers: &HeaderMap) {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };
        if let Some(remaining) = read(RATE_LIMIT_REMAINING_HEADER) {
            self.remaining.store(remaining, Ordering::Relaxed);
        }
        if let Some(reset) = read(RATE_LIMIT_RESET_HEADER) {
            self.reset.store(reset, Ordering::Relaxed);
        }
    }

    fn transport_error(&self, method: &Method, path: &str, err: reqwest::Error) -> CrmError {
        if err.is_timeout() {
            return CrmError::Timeout {
                operation: format!("{} {}", method, path),
                duration_ms: self.config.timeout().as_millis() as u64,
            };
        }
        CrmError::Connection {
            message: format!("{} {} failed: {}", method, path, err),
            source: Some(Box::new(err)),
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Outcome, CrmError> {
        let url = self.url(path);
        let mut retries = 0u32;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .basic_auth(&self.config.username, Some(&self.config.api_key))
                .header(INSTANCE_HEADER, &self.config.instance_name)
                .header(ACCEPT, "application/json");
            if !params.is_empty() {
                request = request.query(params);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, %url, attempt = retries + 1, "sending CRM request");
            let response = request
                .send()
                .await
                .map_err(|err| self.transport_error(&method, path, err))?;

            self.record_rate_limit(response.headers());
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let snapshot = self.rate_limit_snapshot();
                if retries < self.config.retry_attempts {
                    retries += 1;
                    warn!(
                        %method,
                        %url,
                        retry = retries,
                        max_retries = self.config.retry_attempts,
                        remaining = ?snapshot.remaining,
                        reset = ?snapshot.reset,
                        "CRM rate limit hit, backing off"
                    );
                    self.clock.sleep(self.config.retry_delay()).await;
                    continue;
                }
                return Err(CrmError::RateLimited {
                    remaining: snapshot.remaining,
                    reset: snapshot.reset,
                });
            }

            let text = response
                .text()
                .await
                .map_err(|err| self.transport_error(&method, path, err))?;

            if status == StatusCode::NOT_FOUND {
                debug!(%method, %url, "CRM resource not found");
                return Ok(Outcome::NotFound(error_message(&text, status)));
            }

            if status.is_client_error() || status.is_server_error() {
                return Err(CrmError::api(status.as_u16(), error_message(&text, status)));
            }

            if text.trim().is_empty() {
                return Ok(Outcome::Body(Value::Null));
            }
            let value = serde_json::from_str(&text).map_err(|err| {
                CrmError::transformation(format!("invalid JSON from {} {}: {}", method, path, err))
            })?;
            return Ok(Outcome::Body(value));
        }
    }

    async fn write(&self, method: Method, path: &str, body: &Value) -> Result<Value, CrmError> {
        match self.execute(method, path, &[], Some(body)).await? {
            Outcome::Body(value) => Ok(value),
            Outcome::NotFound(message) => Err(CrmError::api(404, message)),
        }
    }
}

/// Extracts a human-readable message from an error body
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["translatedMessage", "message", "error"] {
            if let Some(message) = map.get(key).and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.trim().to_string();
                }
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.chars().take(500).collect();
    }
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

impl DomainPort for CrmClient {}

#[async_trait]
impl CrmPort for CrmClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Option<Value>, CrmError> {
        match self.execute(Method::GET, path, params, None).await? {
            Outcome::Body(value) => Ok(Some(value)),
            Outcome::NotFound(_) => Ok(None),
        }
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, CrmError> {
        self.write(Method::PUT, path, body).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, CrmError> {
        self.write(Method::POST, path, body).await
    }

    async fn delete(&self, path: &str) -> Result<bool, CrmError> {
        match self.execute(Method::DELETE, path, &[], None).await? {
            Outcome::Body(_) => Ok(true),
            Outcome::NotFound(_) => Ok(false),
        }
    }

    fn rate_limit(&self) -> RateLimitSnapshot {
        self.rate_limit_snapshot()
    }
}

#[async_trait]
impl HealthCheckable for CrmClient {
    /// Lists a single company to verify credentials and reachability
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();

        let (status, message) = if !self.is_configured() {
            (
                AdapterHealth::Unhealthy,
                Some("CRM credentials are not configured".to_string()),
            )
        } else {
            let params = vec![("limit".to_string(), "1".to_string())];
            match self.get("company/", &params).await {
                Ok(_) => (AdapterHealth::Healthy, None),
                Err(err @ CrmError::RateLimited { .. }) => (AdapterHealth::Degraded, Some(err.to_string())),
                Err(err) => (AdapterHealth::Unhealthy, Some(err.to_string())),
            }
        };

        HealthCheckResult {
            adapter_id: format!("crm:{}", self.config.instance_name),
            status,
            latency_ms: start.elapsed().as_millis() as u64,
            message,
            rate_limit: self.rate_limit_snapshot(),
            checked_at: Utc::now(),
        }
    }
}
