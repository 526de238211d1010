//! Filtering engine adapters and the rule set assembler.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info};
use sf_compiler::{assemble_rules, build_update, AssembleStats};
use sf_core::types::{CompiledRule, DynamicRuleUpdate, MAX_DYNAMIC_RULES};

use crate::error::EngineError;

/// The declarative engine that finally enforces network rules.
#[async_trait]
pub trait FilteringEngine: Send + Sync {
    /// Ids of every dynamic rule currently installed.
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, EngineError>;

    /// Apply removals then additions as one update. On error nothing changes.
    async fn update_dynamic_rules(&self, update: DynamicRuleUpdate) -> Result<(), EngineError>;
}

/// Compute the rule set an update produces, refusing it the way the browser does.
fn apply_update(
    current: &[CompiledRule],
    update: DynamicRuleUpdate,
    limit: usize,
) -> Result<Vec<CompiledRule>, EngineError> {
    let removed: HashSet<u32> = update.remove_rule_ids.into_iter().collect();
    let mut next: Vec<CompiledRule> = current.iter().filter(|r| !removed.contains(&r.id)).cloned().collect();

    let mut ids: HashSet<u32> = next.iter().map(|r| r.id).collect();
    for rule in &update.add_rules {
        if !ids.insert(rule.id) {
            return Err(EngineError::Rejected(format!("duplicate rule id {}", rule.id)));
        }
    }
    next.extend(update.add_rules);

    if next.len() > limit {
        return Err(EngineError::TooManyRules { count: next.len(), limit });
    }
    Ok(next)
}

/// In-process engine, used by tests and dry runs.
#[derive(Debug)]
pub struct MemoryEngine {
    rules: Mutex<Vec<CompiledRule>>,
    limit: usize,
    updates: Mutex<usize>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::with_limit(MAX_DYNAMIC_RULES)
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            limit,
            updates: Mutex::new(0),
        }
    }

    pub fn rules(&self) -> Vec<CompiledRule> {
        self.rules.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of updates accepted so far.
    pub fn update_count(&self) -> usize {
        *self.updates.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FilteringEngine for MemoryEngine {
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, EngineError> {
        Ok(self.rules.lock().unwrap_or_else(|e| e.into_inner()).iter().map(|r| r.id).collect())
    }

    async fn update_dynamic_rules(&self, update: DynamicRuleUpdate) -> Result<(), EngineError> {
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        *rules = apply_update(&rules, update, self.limit)?;
        *self.updates.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

/// Keeps the installed rule set as a JSON array on disk.
///
/// The file is what a packaging step hands to the browser as the dynamic
/// rule set.
#[derive(Debug, Clone)]
pub struct JsonFileEngine {
    path: PathBuf,
    limit: usize,
}

impl JsonFileEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limit: MAX_DYNAMIC_RULES,
        }
    }

    async fn read_rules(&self) -> Result<Vec<CompiledRule>, EngineError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(EngineError::Io { path: self.path.clone(), source }),
        }
    }
}

#[async_trait]
impl FilteringEngine for JsonFileEngine {
    async fn dynamic_rule_ids(&self) -> Result<Vec<u32>, EngineError> {
        Ok(self.read_rules().await?.iter().map(|r| r.id).collect())
    }

    async fn update_dynamic_rules(&self, update: DynamicRuleUpdate) -> Result<(), EngineError> {
        let current = self.read_rules().await?;
        let next = apply_update(&current, update, self.limit)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| EngineError::Io { path: parent.to_path_buf(), source })?;
        }

        let bytes = serde_json::to_vec_pretty(&next)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|source| EngineError::Io { path: tmp_path.clone(), source })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| EngineError::Io { path: self.path.clone(), source })?;
        Ok(())
    }
}

/// Merges enabled lists into one bounded rule set and installs it.
pub struct RuleSetAssembler {
    budget: usize,
    engine: Arc<dyn FilteringEngine>,
}

impl RuleSetAssembler {
    pub fn new(engine: Arc<dyn FilteringEngine>, budget: usize) -> Self {
        Self { budget, engine }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Replace the engine's whole rule set with the merge of `lists`.
    pub async fn apply<'a, I>(&self, lists: I) -> Result<AssembleStats, EngineError>
    where
        I: IntoIterator<Item = &'a [CompiledRule]>,
    {
        let (rules, stats) = assemble_rules(lists, self.budget);
        if stats.duplicate_ids > 0 {
            debug!("Dropped {} rules with duplicate ids", stats.duplicate_ids);
        }

        let previous = self.engine.dynamic_rule_ids().await?;
        let update = build_update(previous, rules);
        self.engine.update_dynamic_rules(update).await?;

        info!(
            "Applied {} rules ({} offered, {} over budget of {})",
            stats.after, stats.before, stats.over_budget, self.budget
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use sf_core::types::{ResourceType, RuleAction, RuleCondition};

    use super::*;

    fn rule(id: u32, priority: u32) -> CompiledRule {
        CompiledRule {
            id,
            priority,
            action: RuleAction::BLOCK,
            condition: RuleCondition {
                url_filter: format!("tracker{}.example.com", id),
                resource_types: vec![ResourceType::Image],
                initiator_domains: None,
                excluded_initiator_domains: None,
                domain_type: None,
            },
        }
    }

    fn ids(rules: &[CompiledRule]) -> Vec<u32> {
        rules.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn apply_replaces_previous_rule_set() {
        let engine = Arc::new(MemoryEngine::new());
        let assembler = RuleSetAssembler::new(engine.clone(), 10);

        let first = vec![rule(1000, 1), rule(1001, 1)];
        assembler.apply([first.as_slice()]).await.expect("first apply");
        assert_eq!(ids(&engine.rules()), vec![1000, 1001]);

        let second = vec![rule(2000, 1)];
        let stats = assembler.apply([second.as_slice()]).await.expect("second apply");
        assert_eq!(ids(&engine.rules()), vec![2000]);
        assert_eq!(stats.after, 1);
        assert_eq!(engine.update_count(), 2);
    }

    #[tokio::test]
    async fn apply_merges_lists_and_enforces_budget() {
        let engine = Arc::new(MemoryEngine::new());
        let assembler = RuleSetAssembler::new(engine.clone(), 2);

        let list_a = vec![rule(5, 1), rule(3, 100)];
        let list_b = vec![rule(2, 1)];
        let stats = assembler.apply([list_a.as_slice(), list_b.as_slice()]).await.expect("apply");

        assert_eq!(ids(&engine.rules()), vec![3, 2]);
        assert_eq!(stats.before, 3);
        assert_eq!(stats.over_budget, 1);
    }

    #[tokio::test]
    async fn rejected_update_leaves_engine_untouched() {
        let engine = Arc::new(MemoryEngine::with_limit(1));
        let assembler = RuleSetAssembler::new(engine.clone(), 10);

        let one = vec![rule(1, 1)];
        assembler.apply([one.as_slice()]).await.expect("fits");

        let two = vec![rule(2, 1), rule(3, 1)];
        let err = assembler.apply([two.as_slice()]).await.expect_err("over engine limit");
        assert!(matches!(err, EngineError::TooManyRules { count: 2, limit: 1 }));
        assert_eq!(ids(&engine.rules()), vec![1]);
    }

    #[test]
    fn update_with_repeated_id_is_rejected() {
        let update = DynamicRuleUpdate {
            remove_rule_ids: vec![],
            add_rules: vec![rule(7, 1), rule(7, 2)],
        };
        assert!(matches!(apply_update(&[], update, 10), Err(EngineError::Rejected(_))));
    }

    #[tokio::test]
    async fn file_engine_persists_rule_set() {
        let path = std::env::temp_dir().join(format!("sf-engine-{}.json", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;

        let engine = JsonFileEngine::new(&path);
        assert!(engine.dynamic_rule_ids().await.expect("ids").is_empty());

        engine
            .update_dynamic_rules(DynamicRuleUpdate { remove_rule_ids: vec![], add_rules: vec![rule(1, 1), rule(2, 1)] })
            .await
            .expect("first update");
        engine
            .update_dynamic_rules(DynamicRuleUpdate { remove_rule_ids: vec![1, 2], add_rules: vec![rule(3, 2)] })
            .await
            .expect("second update");

        assert_eq!(JsonFileEngine::new(&path).dynamic_rule_ids().await.expect("ids"), vec![3]);
        let _ = tokio::fs::remove_file(&path).await;
    }
}
