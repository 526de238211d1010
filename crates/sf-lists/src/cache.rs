//! Per-list compiled artifacts and their persistence.
//!
//! Each list entry keeps its sources' output separately so that a source
//! answering 304 can keep its previous rules while a sibling source is
//! replaced. The entry as a whole is still swapped in one step.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sf_compiler::ParsedList;
use sf_core::types::{CompiledRule, CosmeticRule, ParseStats, Scriptlet};

use crate::error::StoreError;
use crate::manifest::ListMetadata;
use crate::store::KeyValueStore;

/// Store key for the listId → metadata map.
pub const LIST_METADATA_KEY: &str = "filterListsCache";
/// Store key for the listId → compiled artifacts map.
pub const COMPILED_RULES_KEY: &str = "compiledRulesCache";

/// Output of one source of a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceArtifacts {
    pub url: String,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub rules: Vec<CompiledRule>,
    #[serde(default)]
    pub cosmetic_rules: Vec<CosmeticRule>,
    #[serde(default)]
    pub scriptlets: Vec<Scriptlet>,
    #[serde(default)]
    pub stats: ParseStats,
}

impl SourceArtifacts {
    pub fn from_parsed(url: impl Into<String>, etag: Option<String>, parsed: ParsedList) -> Self {
        Self {
            url: url.into(),
            etag,
            rules: parsed.rules,
            cosmetic_rules: parsed.cosmetic_rules,
            scriptlets: parsed.scriptlets,
            stats: parsed.stats,
        }
    }
}

/// Everything compiled for one list, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListArtifacts {
    pub sources: Vec<SourceArtifacts>,
}

impl ListArtifacts {
    pub fn source(&self, url: &str) -> Option<&SourceArtifacts> {
        self.sources.iter().find(|s| s.url == url)
    }

    /// Network and exception rules, one slice per source.
    pub fn rule_slices(&self) -> impl Iterator<Item = &[CompiledRule]> {
        self.sources.iter().map(|s| s.rules.as_slice())
    }

    pub fn rules(&self) -> impl Iterator<Item = &CompiledRule> {
        self.sources.iter().flat_map(|s| s.rules.iter())
    }

    pub fn cosmetic_rules(&self) -> impl Iterator<Item = &CosmeticRule> {
        self.sources.iter().flat_map(|s| s.cosmetic_rules.iter())
    }

    pub fn scriptlets(&self) -> impl Iterator<Item = &Scriptlet> {
        self.sources.iter().flat_map(|s| s.scriptlets.iter())
    }

    pub fn rule_count(&self) -> usize {
        self.sources.iter().map(|s| s.rules.len()).sum()
    }

    pub fn stats(&self) -> ParseStats {
        let mut total = ParseStats::default();
        for source in &self.sources {
            total.merge(&source.stats);
        }
        total
    }

    /// Highest id used by any record of this list.
    pub fn max_id(&self) -> Option<u32> {
        let rule_ids = self.rules().map(|r| r.id);
        let cosmetic_ids = self.cosmetic_rules().filter_map(|r| numeric_suffix(&r.id));
        let scriptlet_ids = self.scriptlets().filter_map(|s| numeric_suffix(&s.id));
        rule_ids.chain(cosmetic_ids).chain(scriptlet_ids).max()
    }
}

fn numeric_suffix(id: &str) -> Option<u32> {
    id.rsplit('_').next()?.parse().ok()
}

/// listId → compiled artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleCache {
    entries: BTreeMap<String, ListArtifacts>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, list_id: &str) -> Option<&ListArtifacts> {
        self.entries.get(list_id)
    }

    /// Replace a list's artifacts wholesale.
    pub fn replace(&mut self, list_id: &str, artifacts: ListArtifacts) {
        self.entries.insert(list_id.to_string(), artifacts);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_id(&self) -> Option<u32> {
        self.entries.values().filter_map(ListArtifacts::max_id).max()
    }
}

/// State read back from the store at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub metadata: BTreeMap<String, ListMetadata>,
    pub cache: RuleCache,
}

impl PersistedState {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let metadata = load_metadata(store).await?;
        let cache = match store.get(COMPILED_RULES_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => RuleCache::new(),
        };
        debug!("Loaded {} list metadata entries, {} cached lists", metadata.len(), cache.len());
        Ok(Self { metadata, cache })
    }
}

/// Read only the listId → metadata map.
pub async fn load_metadata(store: &dyn KeyValueStore) -> Result<BTreeMap<String, ListMetadata>, StoreError> {
    match store.get(LIST_METADATA_KEY).await? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(BTreeMap::new()),
    }
}

pub async fn save_state(
    store: &dyn KeyValueStore,
    metadata: &BTreeMap<String, ListMetadata>,
    cache: &RuleCache,
) -> Result<(), StoreError> {
    let items: Vec<(String, Value)> = vec![
        (LIST_METADATA_KEY.to_string(), serde_json::to_value(metadata)?),
        (COMPILED_RULES_KEY.to_string(), serde_json::to_value(cache)?),
    ];
    store.set(items).await
}
