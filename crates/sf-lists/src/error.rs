//! Error types for the list lifecycle.
//!
//! Each type matches one recovery scope: a failed source, a failed store
//! operation, a rejected engine update, or unusable configuration.

use std::path::PathBuf;

/// A single source could not be fetched.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
}

/// Persisted state could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The filtering engine refused or failed an update.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine rejected update: {0}")]
    Rejected(String),
    #[error("Update adds {count} rules, engine accepts at most {limit}")]
    TooManyRules { count: usize, limit: usize },
    #[error("Engine I/O failed for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings or manifest could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Duplicate list id '{0}' in manifest")]
    DuplicateListId(String),
}
