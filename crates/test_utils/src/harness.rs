//! Sync Test Harness
//!
//! Wires a `SyncOrchestrator` to the in-memory CRM, form store, mapping store
//! and log sink, driven by a `MockClock`. Every collaborator stays reachable
//! so tests can seed and inspect state.

use std::sync::Arc;

use core_kernel::{CrmPort, MockClock, MockCrm};
use domain_crm::DuplicateCheckConfig;
use domain_fields::FieldMapping;
use domain_sync::{
    FormRecord, InMemoryFormStore, InMemoryLogSink, InMemoryMappingStore, SyncOrchestrator,
    SyncSettings,
};

/// Orchestrator plus its in-memory collaborators
pub struct SyncHarness {
    pub crm: Arc<MockCrm>,
    pub forms: Arc<InMemoryFormStore>,
    pub mappings: Arc<InMemoryMappingStore>,
    pub log: Arc<InMemoryLogSink>,
    pub clock: MockClock,
    pub orchestrator: SyncOrchestrator,
}

/// Configures a `SyncHarness`
pub struct SyncHarnessBuilder {
    crm: MockCrm,
    mapping: FieldMapping,
    settings: SyncSettings,
    duplicate_config: DuplicateCheckConfig,
    log: InMemoryLogSink,
}

impl Default for SyncHarnessBuilder {
    fn default() -> Self {
        Self {
            crm: MockCrm::new(),
            mapping: FieldMapping::new(),
            settings: SyncSettings {
                admin_base_url: "https://admin.example.cz".to_string(),
                ..Default::default()
            },
            duplicate_config: DuplicateCheckConfig::default(),
            log: InMemoryLogSink::new(),
        }
    }
}

impl SyncHarnessBuilder {
    /// Uses a CRM that reports missing credentials
    pub fn unconfigured(mut self) -> Self {
        self.crm = MockCrm::unconfigured();
        self
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_duplicate_config(mut self, config: DuplicateCheckConfig) -> Self {
        self.duplicate_config = config;
        self
    }

    /// Uses a log sink that rejects every entry
    pub fn failing_log(mut self) -> Self {
        self.log = InMemoryLogSink::failing();
        self
    }

    pub fn build(self) -> SyncHarness {
        let crm = Arc::new(self.crm);
        let forms = Arc::new(InMemoryFormStore::new());
        let mappings = Arc::new(InMemoryMappingStore::with_mapping(self.mapping));
        let log = Arc::new(self.log);
        let clock = MockClock::new();

        let port: Arc<dyn CrmPort> = crm.clone();
        let orchestrator = SyncOrchestrator::new(port, forms.clone(), mappings.clone(), self.settings)
            .with_clock(Arc::new(clock.clone()))
            .with_log_sink(log.clone())
            .with_duplicate_config(self.duplicate_config);

        SyncHarness {
            crm,
            forms,
            mappings,
            log,
            clock,
            orchestrator,
        }
    }
}

impl SyncHarness {
    pub fn builder() -> SyncHarnessBuilder {
        SyncHarnessBuilder::default()
    }

    /// Harness with default settings and an empty field mapping
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Stores a form and returns it
    pub async fn store(&self, record: FormRecord) -> FormRecord {
        self.forms.insert(record.clone()).await;
        record
    }

    /// Stored state of a form
    pub async fn stored(&self, record: &FormRecord) -> Option<FormRecord> {
        self.forms.form(record.id).await
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}
