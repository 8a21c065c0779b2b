//! Sync engine settings

use serde::Deserialize;
use std::time::Duration;

/// Tuning for the orchestrator
///
/// Loaded from `SYNC_*` environment variables:
///
/// * `SYNC_ADMIN_BASE_URL` - admin root used for the `adminUrl` field
/// * `SYNC_FILE_BASE_URL` - base for relative file links
/// * `SYNC_BATCH_SIZE` - forms per pending batch (default: 20)
/// * `SYNC_BATCH_DELAY_MS` - pause between forms in a batch (default: 500)
/// * `SYNC_FIELD_CREATION_DELAY_MS` - pause between custom-field creations (default: 250)
/// * `SYNC_CONFIG_CACHE_TTL_SECS` - lifetime of the cached field catalog (default: 300)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub admin_base_url: String,
    pub file_base_url: Option<String>,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub field_creation_delay_ms: u64,
    pub config_cache_ttl_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            admin_base_url: String::new(),
            file_base_url: None,
            batch_size: 20,
            batch_delay_ms: 500,
            field_creation_delay_ms: 250,
            config_cache_ttl_secs: 300,
        }
    }
}

impl SyncSettings {
    /// Load settings from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("SYNC").try_parsing(true))
            .build()?;
        Self::from_config(source)
    }

    pub fn from_config(source: config::Config) -> Result<Self, config::ConfigError> {
        source.try_deserialize()
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn field_creation_delay(&self) -> Duration {
        Duration::from_millis(self.field_creation_delay_ms)
    }

    pub fn config_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config_cache_ttl_secs)
    }
}
