//! Core type definitions for ShieldForge
//!
//! These types mirror the wire format of the declarative request-filtering
//! engine and the persisted cache. Field names are fixed by the engine, so
//! every struct serializes in camelCase and optional condition fields are
//! omitted when absent.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Limits and fixed priorities
// =============================================================================

/// Maximum number of simultaneously active dynamic rules the engine accepts.
pub const MAX_DYNAMIC_RULES: usize = 30_000;

/// First id handed out by a fresh rule id sequence.
pub const DEFAULT_RULE_ID_START: u32 = 1000;

/// Minimum urlFilter length (in characters) after normalization.
pub const MIN_URL_FILTER_LEN: usize = 3;

/// Priority of a plain block rule.
pub const PRIORITY_BLOCK: u32 = 1;
/// Priority of an exception (allow) rule.
pub const PRIORITY_EXCEPTION: u32 = 2;
/// Priority of a `$important` block rule.
pub const PRIORITY_IMPORTANT: u32 = 100;

// =============================================================================
// Resource Types
// =============================================================================

/// Engine resource type. Serialized names are fixed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Script,
    Image,
    Stylesheet,
    Object,
    Xmlhttprequest,
    SubFrame,
    Ping,
    Websocket,
    Webtransport,
    MainFrame,
    Font,
    Media,
    Other,
}

/// Types applied when a rule names no resource type of its own.
pub const DEFAULT_RESOURCE_TYPES: [ResourceType; 7] = [
    ResourceType::Script,
    ResourceType::Image,
    ResourceType::Xmlhttprequest,
    ResourceType::SubFrame,
    ResourceType::Stylesheet,
    ResourceType::Font,
    ResourceType::Media,
];

impl ResourceType {
    /// Map an ABP option name to the engine type.
    ///
    /// Only the names accepted by the option parser are recognized; engine
    /// spellings such as `sub_frame` are not filter syntax.
    pub fn from_abp_name(name: &str) -> Option<Self> {
        match name {
            "script" => Some(Self::Script),
            "image" => Some(Self::Image),
            "stylesheet" => Some(Self::Stylesheet),
            "object" => Some(Self::Object),
            "xmlhttprequest" => Some(Self::Xmlhttprequest),
            "subdocument" => Some(Self::SubFrame),
            "ping" => Some(Self::Ping),
            "websocket" => Some(Self::Websocket),
            "webrtc" => Some(Self::Webtransport),
            "document" => Some(Self::MainFrame),
            "font" => Some(Self::Font),
            "media" => Some(Self::Media),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Engine name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Image => "image",
            Self::Stylesheet => "stylesheet",
            Self::Object => "object",
            Self::Xmlhttprequest => "xmlhttprequest",
            Self::SubFrame => "sub_frame",
            Self::Ping => "ping",
            Self::Websocket => "websocket",
            Self::Webtransport => "webtransport",
            Self::MainFrame => "main_frame",
            Self::Font => "font",
            Self::Media => "media",
            Self::Other => "other",
        }
    }

    /// Single-bit mask for this type.
    pub fn mask(self) -> ResourceMask {
        match self {
            Self::Script => ResourceMask::SCRIPT,
            Self::Image => ResourceMask::IMAGE,
            Self::Stylesheet => ResourceMask::STYLESHEET,
            Self::Object => ResourceMask::OBJECT,
            Self::Xmlhttprequest => ResourceMask::XMLHTTPREQUEST,
            Self::SubFrame => ResourceMask::SUB_FRAME,
            Self::Ping => ResourceMask::PING,
            Self::Websocket => ResourceMask::WEBSOCKET,
            Self::Webtransport => ResourceMask::WEBTRANSPORT,
            Self::MainFrame => ResourceMask::MAIN_FRAME,
            Self::Font => ResourceMask::FONT,
            Self::Media => ResourceMask::MEDIA,
            Self::Other => ResourceMask::OTHER,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// Resource type bit mask.
    ///
    /// Used while parsing options to collapse duplicates and to record
    /// negated types, which are tracked but never applied.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceMask: u16 {
        const SCRIPT = 1 << 0;
        const IMAGE = 1 << 1;
        const STYLESHEET = 1 << 2;
        const OBJECT = 1 << 3;
        const XMLHTTPREQUEST = 1 << 4;
        const SUB_FRAME = 1 << 5;
        const PING = 1 << 6;
        const WEBSOCKET = 1 << 7;
        const WEBTRANSPORT = 1 << 8;
        const MAIN_FRAME = 1 << 9;
        const FONT = 1 << 10;
        const MEDIA = 1 << 11;
        const OTHER = 1 << 12;
    }
}

// =============================================================================
// Compiled network rules
// =============================================================================

/// What the engine does with a matching request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Cancel the request
    Block,
    /// Exception rule (@@...) - lets the request through
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
}

impl RuleAction {
    pub const BLOCK: Self = Self { kind: ActionType::Block };
    pub const ALLOW: Self = Self { kind: ActionType::Allow };
}

/// Party restriction derived from `third-party` / `first-party` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DomainType {
    FirstParty,
    ThirdParty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_initiator_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_type: Option<DomainType>,
}

/// A network or exception rule in the engine's declarative format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

/// One atomic replacement of the engine's dynamic rule set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicRuleUpdate {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<CompiledRule>,
}

// =============================================================================
// Cosmetic rules and scriptlets
// =============================================================================

/// Element-hiding rule (`##`, `#@#`, `#?#`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CosmeticRule {
    pub id: String,
    pub list_id: String,
    pub domains: Vec<String>,
    pub exclude_domains: Vec<String>,
    pub selector: String,
    pub exception: bool,
}

/// Scriptlet injection directive (`#+js(...)`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scriptlet {
    pub id: String,
    pub list_id: String,
    pub domains: Vec<String>,
    pub exclude_domains: Vec<String>,
    pub name: String,
    pub args: Vec<String>,
}

// =============================================================================
// Parse statistics
// =============================================================================

/// Per-list line accounting.
///
/// `total` counts every non-blank, non-comment line; the four category
/// counters plus `invalid` always sum to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    pub total: usize,
    pub network_rules: usize,
    pub cosmetic_rules: usize,
    pub scriptlets: usize,
    pub exceptions: usize,
    pub comments: usize,
    pub invalid: usize,
}

impl ParseStats {
    /// Sum of the classified counters, which must equal `total`.
    pub fn classified(&self) -> usize {
        self.network_rules + self.cosmetic_rules + self.scriptlets + self.exceptions + self.invalid
    }

    pub fn merge(&mut self, other: &ParseStats) {
        self.total += other.total;
        self.network_rules += other.network_rules;
        self.cosmetic_rules += other.cosmetic_rules;
        self.scriptlets += other.scriptlets;
        self.exceptions += other.exceptions;
        self.comments += other.comments;
        self.invalid += other.invalid;
    }
}

impl fmt::Display for ParseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rules ({} network, {} exceptions, {} cosmetic, {} scriptlets, {} invalid), {} comments",
            self.total,
            self.network_rules,
            self.exceptions,
            self.cosmetic_rules,
            self.scriptlets,
            self.invalid,
            self.comments
        )
    }
}
