use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::manifest::{CategoryInfo, FilterList};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub id: String,
    pub title: String,
    pub category: String,
    pub enabled: bool,
    pub rule_count: usize,
    pub last_fetch: Option<DateTime<Utc>>,
    pub priority: i32,
    pub requires_scriptlets: bool,
}

impl From<&FilterList> for ListSummary {
    fn from(list: &FilterList) -> Self {
        Self {
            id: list.id.clone(),
            title: list.title.clone(),
            category: list.category.clone(),
            enabled: list.enabled,
            rule_count: list.rule_count,
            last_fetch: list.last_fetch,
            priority: list.priority,
            requires_scriptlets: list.requires_scriptlets,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotals {
    pub total_lists: usize,
    pub enabled_lists: usize,
    /// Sum of `ruleCount` over enabled lists, before the budget.
    pub total_rules: usize,
    pub max_rules: usize,
    pub utilization_percent: u32,
}

impl StatusTotals {
    pub fn compute(lists: &[FilterList], max_rules: usize) -> Self {
        let enabled: Vec<&FilterList> = lists.iter().filter(|l| l.enabled).collect();
        let total_rules: usize = enabled.iter().map(|l| l.rule_count).sum();
        Self {
            total_lists: lists.len(),
            enabled_lists: enabled.len(),
            total_rules,
            max_rules,
            utilization_percent: utilization_percent(total_rules, max_rules),
        }
    }
}

/// Rounded share of the budget in use. Can exceed 100 when lists offer more
/// rules than the engine accepts.
pub fn utilization_percent(total_rules: usize, max_rules: usize) -> u32 {
    if max_rules == 0 {
        return 0;
    }
    let percent = (total_rules as f64 / max_rules as f64 * 100.0).round();
    percent.min(u32::MAX as f64) as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    pub lists: Vec<ListSummary>,
    pub categories: BTreeMap<String, CategoryInfo>,
    pub summary: StatusTotals,
}
