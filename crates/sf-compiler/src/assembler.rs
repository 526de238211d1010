use std::collections::HashSet;

use sf_core::types::{CompiledRule, DynamicRuleUpdate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleStats {
    /// Rules offered by all enabled lists.
    pub before: usize,
    /// Rules kept after the budget was applied.
    pub after: usize,
    /// Rules dropped because another rule already used their id.
    pub duplicate_ids: usize,
    /// Rules dropped by the budget.
    pub over_budget: usize,
}

/// Order rules for the engine and cut them to `max_rules`.
///
/// Higher priority first; equal priorities keep the lowest (oldest) id.
/// The sort is stable, so rules that tie on both keep their input order.
pub fn prioritize_rules(mut rules: Vec<CompiledRule>, max_rules: usize) -> Vec<CompiledRule> {
    sort_by_priority(&mut rules);
    rules.truncate(max_rules);
    rules
}

fn sort_by_priority(rules: &mut [CompiledRule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
}

/// Merge per-list rule arrays into one bounded set.
///
/// Lists are concatenated in the order given. The engine rejects an update
/// that repeats an id, so only the first rule per id survives the sort.
pub fn assemble_rules<'a, I>(lists: I, max_rules: usize) -> (Vec<CompiledRule>, AssembleStats)
where
    I: IntoIterator<Item = &'a [CompiledRule]>,
{
    let mut all_rules: Vec<CompiledRule> = Vec::new();
    for rules in lists {
        all_rules.extend_from_slice(rules);
    }

    let before = all_rules.len();
    sort_by_priority(&mut all_rules);

    let mut seen: HashSet<u32> = HashSet::with_capacity(all_rules.len());
    let mut duplicate_ids = 0usize;
    all_rules.retain(|rule| {
        if seen.insert(rule.id) {
            true
        } else {
            duplicate_ids += 1;
            false
        }
    });

    let unique = all_rules.len();
    all_rules.truncate(max_rules);
    let after = all_rules.len();

    let stats = AssembleStats {
        before,
        after,
        duplicate_ids,
        over_budget: unique - after,
    };

    (all_rules, stats)
}

/// Build the single update that swaps the engine's whole rule set.
pub fn build_update(previous_ids: Vec<u32>, rules: Vec<CompiledRule>) -> DynamicRuleUpdate {
    DynamicRuleUpdate {
        remove_rule_ids: previous_ids,
        add_rules: rules,
    }
}

#[cfg(test)]
mod tests {
    use sf_core::types::{ResourceType, RuleAction, RuleCondition, MAX_DYNAMIC_RULES};

    use super::*;

    fn rule(id: u32, priority: u32) -> CompiledRule {
        CompiledRule {
            id,
            priority,
            action: RuleAction::BLOCK,
            condition: RuleCondition {
                url_filter: format!("ads{}.example.com", id),
                resource_types: vec![ResourceType::Script],
                initiator_domains: None,
                excluded_initiator_domains: None,
                domain_type: None,
            },
        }
    }

    fn ids(rules: &[CompiledRule]) -> Vec<u32> {
        rules.iter().map(|r| r.id).collect()
    }

    #[test]
    fn orders_by_priority_then_id() {
        let rules = vec![rule(5, 1), rule(3, 100), rule(2, 1)];
        assert_eq!(ids(&prioritize_rules(rules, 10)), vec![3, 2, 5]);
    }

    #[test]
    fn exceptions_sort_between_important_and_block() {
        let rules = vec![rule(1, 1), rule(2, 2), rule(3, 100), rule(4, 2)];
        assert_eq!(ids(&prioritize_rules(rules, 10)), vec![3, 2, 4, 1]);
    }

    #[test]
    fn enforces_budget_keeping_lowest_ids() {
        let rules: Vec<CompiledRule> = (0..30_050u32).rev().map(|i| rule(1000 + i, 1)).collect();
        let kept = prioritize_rules(rules, MAX_DYNAMIC_RULES);
        assert_eq!(kept.len(), 30_000);
        assert_eq!(kept.first().map(|r| r.id), Some(1000));
        assert_eq!(kept.last().map(|r| r.id), Some(30_999));
    }

    #[test]
    fn assembles_lists_and_drops_duplicate_ids() {
        let list_a = vec![rule(10, 1), rule(11, 1)];
        let list_b = vec![rule(11, 100), rule(12, 2)];
        let (rules, stats) = assemble_rules([list_a.as_slice(), list_b.as_slice()], 2);

        assert_eq!(ids(&rules), vec![11, 12]);
        assert_eq!(rules[0].priority, 100);
        assert_eq!(stats.before, 4);
        assert_eq!(stats.duplicate_ids, 1);
        assert_eq!(stats.over_budget, 1);
        assert_eq!(stats.after, 2);
    }

    #[test]
    fn update_replaces_every_previous_id() {
        let update = build_update(vec![1, 2, 3], vec![rule(4, 1)]);
        assert_eq!(update.remove_rule_ids, vec![1, 2, 3]);
        assert_eq!(ids(&update.add_rules), vec![4]);

        let value = serde_json::to_value(&update).expect("serialize");
        assert!(value.get("removeRuleIds").is_some());
        assert!(value.get("addRules").is_some());
    }
}
