//! ShieldForge filter list lifecycle.
//!
//! Loads the list manifest, fetches sources with conditional requests,
//! compiles them with `sf-compiler`, caches per-list artifacts, and installs
//! the merged, budget-bounded rule set into a filtering engine.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod store;

pub use cache::{ListArtifacts, PersistedState, RuleCache, SourceArtifacts, COMPILED_RULES_KEY, LIST_METADATA_KEY};
pub use config::Settings;
pub use engine::{FilteringEngine, JsonFileEngine, MemoryEngine, RuleSetAssembler};
pub use error::{ConfigError, EngineError, FetchError, StoreError};
pub use fetch::{FetchOutcome, HttpFetcher, SourceFetcher};
pub use manifest::{CategoryInfo, FilterList, FilterListDescriptor, FilterSource, ListMetadata, Manifest};
pub use registry::{ListRegistry, RefreshOutcome, RefreshSummary, ToggleTarget};
pub use scheduler::{SchedulerCommand, SchedulerHandle, UpdateScheduler};
pub use status::{ListSummary, RegistryStatus, StatusTotals};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
