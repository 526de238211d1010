//! ShieldForge Core Library
//!
//! Shared definitions for the ShieldForge filter compiler: the declarative
//! rule format consumed by the browser's request-filtering engine, cosmetic
//! and scriptlet records, parse statistics, and hostname helpers.
//!
//! # Modules
//!
//! - `types`: Wire types, resource type table, fixed priorities and limits
//! - `domain`: Domain list splitting and hostname scoping

pub mod domain;
pub mod types;

// Re-export commonly used types
pub use domain::{applies_to_host, host_matches, split_domain_list};
pub use types::{
    ActionType, CompiledRule, CosmeticRule, DomainType, DynamicRuleUpdate, ParseStats, ResourceMask,
    ResourceType, RuleAction, RuleCondition, Scriptlet, DEFAULT_RESOURCE_TYPES, DEFAULT_RULE_ID_START,
    MAX_DYNAMIC_RULES,
};
