//! The filter list registry: list state, refresh cycles and rule application.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use serde::Serialize;
use sf_compiler::{AssembleStats, FilterParser};
use sf_core::domain::applies_to_host;
use sf_core::types::{CosmeticRule, Scriptlet};

use crate::cache::{load_metadata, save_state, ListArtifacts, PersistedState, RuleCache, SourceArtifacts};
use crate::config::Settings;
use crate::engine::{FilteringEngine, RuleSetAssembler};
use crate::error::{FetchError, StoreError};
use crate::fetch::{FetchOutcome, SourceFetcher};
use crate::manifest::{CategoryInfo, FilterList, ListMetadata, Manifest};
use crate::status::{ListSummary, RegistryStatus, StatusTotals};
use crate::store::KeyValueStore;

/// What one list's refresh did to its cached artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RefreshOutcome {
    /// At least one source delivered new content.
    Updated,
    /// Every source answered 304.
    NotModified,
    /// No source could be fetched; the previous artifacts were kept.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub updated: usize,
    pub not_modified: usize,
    pub failed: usize,
    /// Rules installed in the engine, or `None` when applying failed.
    pub applied_rules: Option<usize>,
}

impl RefreshSummary {
    fn record(&mut self, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Updated => self.updated += 1,
            RefreshOutcome::NotModified => self.not_modified += 1,
            RefreshOutcome::Failed => self.failed += 1,
        }
    }
}

/// What a toggle applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleTarget {
    List(String),
    Category(String),
}

pub struct ListRegistry {
    lists: Vec<FilterList>,
    categories: BTreeMap<String, CategoryInfo>,
    parser: FilterParser,
    cache: RuleCache,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn KeyValueStore>,
    assembler: RuleSetAssembler,
}

impl ListRegistry {
    pub fn new(
        manifest: Manifest,
        settings: &Settings,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn KeyValueStore>,
        engine: Arc<dyn FilteringEngine>,
    ) -> Self {
        Self {
            lists: manifest.lists.into_iter().map(FilterList::from).collect(),
            categories: manifest.categories,
            parser: FilterParser::with_start_id(settings.rule_id_start),
            cache: RuleCache::new(),
            fetcher,
            store,
            assembler: RuleSetAssembler::new(engine, settings.max_dynamic_rules),
        }
    }

    pub fn lists(&self) -> &[FilterList] {
        &self.lists
    }

    pub fn list(&self, id: &str) -> Option<&FilterList> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn categories(&self) -> &BTreeMap<String, CategoryInfo> {
        &self.categories
    }

    pub fn enabled_lists(&self) -> Vec<&FilterList> {
        self.lists.iter().filter(|l| l.enabled).collect()
    }

    pub fn lists_by_category(&self, category: &str) -> Vec<&FilterList> {
        self.lists.iter().filter(|l| l.category == category).collect()
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    /// Id the next compiled record will receive.
    pub fn next_rule_id(&self) -> u32 {
        self.parser.ids().peek()
    }

    /// Load persisted metadata and artifacts, overriding manifest defaults.
    pub async fn load_cached(&mut self) -> Result<(), StoreError> {
        let state = PersistedState::load(self.store.as_ref()).await?;

        for list in &mut self.lists {
            if let Some(metadata) = state.metadata.get(&list.id) {
                list.apply_metadata(metadata);
            }
        }
        if let Some(max_id) = state.cache.max_id() {
            self.parser.ids_mut().advance_past(max_id);
        }
        self.cache = state.cache;

        info!("Restored {} cached lists, next rule id {}", self.cache.len(), self.next_rule_id());
        Ok(())
    }

    pub async fn save_cached(&self) -> Result<(), StoreError> {
        let metadata: BTreeMap<String, ListMetadata> =
            self.lists.iter().map(|l| (l.id.clone(), l.metadata())).collect();
        save_state(self.store.as_ref(), &metadata, &self.cache).await
    }

    /// Adopt enabled flags written to the store by another registry sharing
    /// it. Nothing else is read back. Returns how many lists changed state.
    pub async fn sync_enabled(&mut self) -> Result<usize, StoreError> {
        let metadata = load_metadata(self.store.as_ref()).await?;

        let mut changed = 0;
        for list in &mut self.lists {
            let stored = metadata.get(&list.id).and_then(|m| m.enabled);
            if let Some(enabled) = stored.filter(|&e| e != list.enabled) {
                info!("List '{}' {} in the store", list.id, if enabled { "enabled" } else { "disabled" });
                list.enabled = enabled;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn persist(&self) {
        if let Err(e) = self.save_cached().await {
            error!("Failed to persist filter list cache: {}", e);
        }
    }

    /// Restore cached state, refresh every enabled list and apply the result.
    pub async fn initialize(&mut self) -> RefreshSummary {
        if let Err(e) = self.load_cached().await {
            error!("Failed to load filter list cache, starting empty: {}", e);
        }
        self.refresh_all(false).await
    }

    /// Refresh every enabled list, then re-assemble, apply and persist.
    pub async fn refresh_all(&mut self, force: bool) -> RefreshSummary {
        let indices: Vec<usize> = (0..self.lists.len()).filter(|&i| self.lists[i].enabled).collect();
        info!("Refreshing {} enabled lists{}", indices.len(), if force { " (forced)" } else { "" });

        let results = self.fetch_lists(&indices, force).await;

        let mut summary = RefreshSummary::default();
        for (&index, list_results) in indices.iter().zip(results) {
            summary.record(self.absorb(index, list_results));
        }

        summary.applied_rules = self.apply_rules().await.map(|stats| stats.after);
        self.persist().await;

        info!(
            "Refresh complete: {} updated, {} unchanged, {} failed",
            summary.updated, summary.not_modified, summary.failed
        );
        summary
    }

    /// Refresh one list regardless of its enabled flag.
    ///
    /// Returns false for an unknown id or when every source failed.
    pub async fn refresh_list(&mut self, id: &str, force: bool) -> bool {
        let Some(index) = self.lists.iter().position(|l| l.id == id) else {
            warn!("Cannot refresh unknown list '{}'", id);
            return false;
        };

        let mut results = self.fetch_lists(&[index], force).await;
        let outcome = self.absorb(index, results.pop().unwrap_or_default());

        self.apply_rules().await;
        self.persist().await;
        outcome != RefreshOutcome::Failed
    }

    /// Issue every source request of the given lists at once.
    async fn fetch_lists(
        &self,
        indices: &[usize],
        force: bool,
    ) -> Vec<Vec<Result<FetchOutcome, FetchError>>> {
        let fetcher = &self.fetcher;
        let cache = &self.cache;

        join_all(indices.iter().map(move |&index| {
            let list = &self.lists[index];
            join_all(list.sources.iter().map(move |source| {
                let etag = if force {
                    None
                } else {
                    cache
                        .get(&list.id)
                        .and_then(|artifacts| artifacts.source(&source.url))
                        .and_then(|segment| segment.etag.clone())
                };
                async move { fetcher.fetch(&source.url, etag.as_deref()).await }
            }))
        }))
        .await
    }

    /// Fold one list's fetch results into the cache.
    fn absorb(&mut self, index: usize, results: Vec<Result<FetchOutcome, FetchError>>) -> RefreshOutcome {
        let list = &mut self.lists[index];
        let previous = self.cache.get(&list.id);

        let mut segments = Vec::with_capacity(list.sources.len());
        let mut succeeded = 0usize;
        let mut changed = false;
        let mut latest_etag = None;

        for (source, result) in list.sources.iter().zip(results) {
            match result {
                Ok(FetchOutcome::NotModified) => {
                    succeeded += 1;
                    debug!("[{}] {} not modified", list.id, source.title);
                    if let Some(segment) = previous.and_then(|p| p.source(&source.url)) {
                        segments.push(segment.clone());
                    }
                }
                Ok(FetchOutcome::Fetched { body, etag }) => {
                    succeeded += 1;
                    changed = true;
                    let parsed = self.parser.parse_filter_list(&body, &list.id);
                    debug!("[{}] {}: {}", list.id, source.title, parsed.stats);
                    if etag.is_some() {
                        latest_etag = etag.clone();
                    }
                    segments.push(SourceArtifacts::from_parsed(&source.url, etag, parsed));
                }
                Err(e) => {
                    warn!("[{}] failed to fetch {} ({}): {}", list.id, source.title, source.url, e);
                }
            }
        }

        if succeeded == 0 && !list.sources.is_empty() {
            warn!("[{}] every source failed, keeping cached rules", list.id);
            return RefreshOutcome::Failed;
        }

        list.last_fetch = Some(Utc::now());
        if !changed && segments.len() == list.sources.len() {
            return RefreshOutcome::NotModified;
        }

        let artifacts = ListArtifacts { sources: segments };
        info!("[{}] {}", list.id, artifacts.stats());
        list.rule_count = artifacts.rule_count();
        if latest_etag.is_some() {
            list.etag = latest_etag;
        }
        self.cache.replace(&list.id, artifacts);
        RefreshOutcome::Updated
    }

    /// Assemble enabled lists into the engine. Failures are logged.
    pub async fn apply_rules(&self) -> Option<AssembleStats> {
        let cache = &self.cache;
        let slices = self
            .lists
            .iter()
            .filter(|l| l.enabled)
            .filter_map(|l| cache.get(&l.id))
            .flat_map(|artifacts| artifacts.rule_slices());

        match self.assembler.apply(slices).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!("Failed to apply dynamic rules: {}", e);
                None
            }
        }
    }

    /// Returns false for an unknown id.
    pub async fn toggle_list(&mut self, id: &str, enabled: bool) -> bool {
        let Some(list) = self.lists.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        list.enabled = enabled;
        info!("List '{}' {}", id, if enabled { "enabled" } else { "disabled" });

        self.apply_rules().await;
        self.persist().await;
        true
    }

    /// Set the enabled flag of every list in `category`; returns how many
    /// lists belong to it.
    pub async fn toggle_category(&mut self, category: &str, enabled: bool) -> usize {
        let mut touched = 0;
        for list in self.lists.iter_mut().filter(|l| l.category == category) {
            list.enabled = enabled;
            touched += 1;
        }
        if touched == 0 {
            return 0;
        }
        info!("Category '{}': {} lists {}", category, touched, if enabled { "enabled" } else { "disabled" });

        self.apply_rules().await;
        self.persist().await;
        touched
    }

    /// Toggle a list or a category; returns how many lists it covered.
    pub async fn toggle(&mut self, target: &ToggleTarget, enabled: bool) -> usize {
        match target {
            ToggleTarget::List(id) => usize::from(self.toggle_list(id, enabled).await),
            ToggleTarget::Category(category) => self.toggle_category(category, enabled).await,
        }
    }

    fn enabled_artifacts(&self) -> impl Iterator<Item = &ListArtifacts> {
        self.lists
            .iter()
            .filter(|l| l.enabled)
            .filter_map(move |l| self.cache.get(&l.id))
    }

    /// Element hiding rules to inject on `host`.
    pub fn cosmetic_rules_for(&self, host: &str) -> Vec<&CosmeticRule> {
        let host = host.to_ascii_lowercase();
        self.enabled_artifacts()
            .flat_map(|artifacts| artifacts.cosmetic_rules())
            .filter(|rule| !rule.exception)
            .filter(|rule| applies_to_host(&host, &rule.domains, &rule.exclude_domains))
            .collect()
    }

    /// Scriptlets to run on `host`.
    pub fn scriptlets_for(&self, host: &str) -> Vec<&Scriptlet> {
        let host = host.to_ascii_lowercase();
        self.enabled_artifacts()
            .flat_map(|artifacts| artifacts.scriptlets())
            .filter(|s| applies_to_host(&host, &s.domains, &s.exclude_domains))
            .collect()
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            lists: self.lists.iter().map(ListSummary::from).collect(),
            categories: self.categories.clone(),
            summary: StatusTotals::compute(&self.lists, self.assembler.budget()),
        }
    }
}
