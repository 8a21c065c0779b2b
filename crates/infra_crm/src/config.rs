//! CRM connection configuration

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// API key value shipped in sample configuration; never a real credential
pub const PLACEHOLDER_API_KEY: &str = "your-api-key";

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://app.raynet.cz/api/v2/";

/// Connection settings for the CRM client
///
/// Loaded from `CRM_*` environment variables:
///
/// * `CRM_BASE_URL` - API root (default: the public cloud endpoint)
/// * `CRM_INSTANCE_NAME` - CRM instance, sent as `X-Instance-Name`
/// * `CRM_USERNAME` - login of the API user
/// * `CRM_API_KEY` - API key of that user
/// * `CRM_TIMEOUT_SECS` - per-request timeout (default: 30)
/// * `CRM_RETRY_ATTEMPTS` - retries after a 429 response (default: 3)
/// * `CRM_RETRY_DELAY_MS` - sleep before each retry (default: 1000)
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub base_url: String,
    pub instance_name: String,
    pub username: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            instance_name: String::new(),
            username: String::new(),
            api_key: String::new(),
            timeout_secs: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrmConfig")
            .field("base_url", &self.base_url)
            .field("instance_name", &self.instance_name)
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

impl CrmConfig {
    /// Creates a configuration with credentials and default tuning
    pub fn new(
        instance_name: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            username: username.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("CRM").try_parsing(true))
            .build()?;
        Self::from_config(source)
    }

    /// Deserializes from an already assembled configuration source
    pub fn from_config(source: config::Config) -> Result<Self, config::ConfigError> {
        source.try_deserialize()
    }

    /// Sets the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets retry behaviour for rate-limited requests
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// True when all credentials are set and the key is not the placeholder
    pub fn is_configured(&self) -> bool {
        !self.instance_name.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && self.api_key.trim() != PLACEHOLDER_API_KEY
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
