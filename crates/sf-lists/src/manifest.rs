//! Filter list manifest and runtime list records.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One download location of a filter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSource {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterListDescriptor {
    pub id: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub priority: i32,
    pub sources: Vec<FilterSource>,
    #[serde(default)]
    pub requires_scriptlets: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// The static list catalogue shipped with the extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub lists: Vec<FilterListDescriptor>,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryInfo>,
}

impl Manifest {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let manifest: Manifest = serde_json::from_str(content)?;

        let mut seen = HashSet::new();
        for list in &manifest.lists {
            if !seen.insert(list.id.as_str()) {
                return Err(ConfigError::DuplicateListId(list.id.clone()));
            }
        }

        Ok(manifest)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&content)
    }
}

/// Runtime state of one filter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterList {
    pub id: String,
    pub title: String,
    pub category: String,
    pub priority: i32,
    pub sources: Vec<FilterSource>,
    pub requires_scriptlets: bool,
    pub enabled: bool,
    pub rule_count: usize,
    pub last_fetch: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

impl From<FilterListDescriptor> for FilterList {
    fn from(descriptor: FilterListDescriptor) -> Self {
        Self {
            id: descriptor.id,
            title: descriptor.title,
            category: descriptor.category,
            priority: descriptor.priority,
            sources: descriptor.sources,
            requires_scriptlets: descriptor.requires_scriptlets,
            enabled: descriptor.enabled_by_default,
            rule_count: 0,
            last_fetch: None,
            etag: None,
        }
    }
}

/// Per-list state persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    #[serde(default)]
    pub rule_count: usize,
    #[serde(default)]
    pub last_fetch: Option<DateTime<Utc>>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl FilterList {
    pub fn metadata(&self) -> ListMetadata {
        ListMetadata {
            rule_count: self.rule_count,
            last_fetch: self.last_fetch,
            etag: self.etag.clone(),
            enabled: Some(self.enabled),
        }
    }

    /// Overlay persisted metadata on manifest defaults.
    pub fn apply_metadata(&mut self, metadata: &ListMetadata) {
        self.rule_count = metadata.rule_count;
        self.last_fetch = metadata.last_fetch;
        self.etag = metadata.etag.clone();
        if let Some(enabled) = metadata.enabled {
            self.enabled = enabled;
        }
    }
}
