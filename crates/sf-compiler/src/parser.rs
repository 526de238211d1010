use log::debug;
use serde::{Deserialize, Serialize};

use sf_core::types::{
    CompiledRule, CosmeticRule, ParseStats, RuleAction, RuleCondition, Scriptlet, DEFAULT_RESOURCE_TYPES,
    MIN_URL_FILTER_LEN, PRIORITY_BLOCK, PRIORITY_EXCEPTION, PRIORITY_IMPORTANT,
};

use crate::cosmetic::{compile_cosmetic, compile_scriptlet, is_cosmetic_line, is_scriptlet_line};
use crate::options::{parse_options, split_rule_options, ParsedOptions};
use crate::sequence::RuleIdSequence;

/// Reason a single line failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("URL filter '{0}' is shorter than 3 characters")]
    PatternTooShort(String),
    #[error("Cosmetic rule has an empty selector")]
    EmptySelector,
    #[error("No cosmetic marker found")]
    MissingMarker,
    #[error("Scriptlet does not match domains#+js(name, ...)")]
    MalformedScriptlet,
    #[error("Scriptlet has an empty name")]
    EmptyScriptletName,
}

/// How a trimmed, non-blank line is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    Cosmetic,
    Scriptlet,
    Exception,
    Network,
}

/// Classify a line. Returns `None` for blank lines.
///
/// Precedence is significant: cosmetic markers are checked before the
/// scriptlet and exception markers, so `example.com##+js(x)` and
/// `example.com##div@@x` are both cosmetic rules.
pub fn classify_line(line: &str) -> Option<LineKind> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let kind = if line.starts_with('!') || line.starts_with('[') {
        LineKind::Comment
    } else if is_cosmetic_line(line) {
        LineKind::Cosmetic
    } else if is_scriptlet_line(line) {
        LineKind::Scriptlet
    } else if line.contains("@@") {
        LineKind::Exception
    } else {
        LineKind::Network
    };
    Some(kind)
}

/// Compiled output of one filter list (or one source of it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedList {
    /// Network and exception rules, in line order.
    pub rules: Vec<CompiledRule>,
    pub cosmetic_rules: Vec<CosmeticRule>,
    pub scriptlets: Vec<Scriptlet>,
    pub stats: ParseStats,
}

/// Line-oriented ABP/uBO filter compiler.
#[derive(Debug, Clone, Default)]
pub struct FilterParser {
    ids: RuleIdSequence,
}

impl FilterParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_id(start: u32) -> Self {
        Self { ids: RuleIdSequence::new(start) }
    }

    pub fn ids(&self) -> &RuleIdSequence {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut RuleIdSequence {
        &mut self.ids
    }

    /// Restart id assignment; required between independent sessions that
    /// must produce identical output.
    pub fn reset_ids(&mut self, start: u32) {
        self.ids.reset(start);
    }

    pub fn parse_filter_list(&mut self, text: &str, list_id: &str) -> ParsedList {
        let mut parsed = ParsedList::default();

        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            let Some(kind) = classify_line(line) else {
                continue;
            };

            if kind == LineKind::Comment {
                parsed.stats.comments += 1;
                continue;
            }

            parsed.stats.total += 1;

            let outcome = match kind {
                LineKind::Cosmetic => compile_cosmetic(line, list_id, &mut self.ids).map(|rule| {
                    parsed.cosmetic_rules.push(rule);
                    parsed.stats.cosmetic_rules += 1;
                }),
                LineKind::Scriptlet => compile_scriptlet(line, list_id, &mut self.ids).map(|scriptlet| {
                    parsed.scriptlets.push(scriptlet);
                    parsed.stats.scriptlets += 1;
                }),
                LineKind::Exception => self.compile_exception(line).map(|rule| {
                    parsed.rules.push(rule);
                    parsed.stats.exceptions += 1;
                }),
                LineKind::Network => self.compile_network(line).map(|rule| {
                    parsed.rules.push(rule);
                    parsed.stats.network_rules += 1;
                }),
                LineKind::Comment => Ok(()),
            };

            if let Err(err) = outcome {
                debug!("[{}] line {} rejected: {} ({})", list_id, index + 1, err, line);
                parsed.stats.invalid += 1;
            }
        }

        parsed
    }

    /// Compile a block rule such as `||ads.example.com^$script,third-party`.
    pub fn compile_network(&mut self, line: &str) -> Result<CompiledRule, RuleError> {
        let (pattern, options_text) = split_rule_options(line);
        let options = options_text.map(parse_options).unwrap_or_default();
        let url_filter = normalize_url_filter(pattern)?;

        let priority = if options.important { PRIORITY_IMPORTANT } else { PRIORITY_BLOCK };

        Ok(CompiledRule {
            id: self.ids.next_id(),
            priority,
            action: RuleAction::BLOCK,
            condition: build_condition(url_filter, &options),
        })
    }

    /// Compile an exception rule such as `@@||cdn.example.com^$script`.
    ///
    /// Exceptions always carry priority 2, `$important` included.
    pub fn compile_exception(&mut self, line: &str) -> Result<CompiledRule, RuleError> {
        let body = line.strip_prefix("@@").unwrap_or(line);
        let (pattern, options_text) = split_rule_options(body);
        let options = options_text.map(parse_options).unwrap_or_default();
        let url_filter = normalize_url_filter(pattern)?;

        Ok(CompiledRule {
            id: self.ids.next_id(),
            priority: PRIORITY_EXCEPTION,
            action: RuleAction::ALLOW,
            condition: build_condition(url_filter, &options),
        })
    }
}

/// Compile a whole list with a fresh id sequence starting at the default seed.
pub fn parse_filter_list(text: &str, list_id: &str) -> ParsedList {
    FilterParser::new().parse_filter_list(text, list_id)
}

/// Strip anchors from a pattern and enforce the length floor.
///
/// `*` and `^` left inside the pattern keep their urlFilter wildcard meaning.
pub fn normalize_url_filter(pattern: &str) -> Result<String, RuleError> {
    let pattern = pattern.trim();
    let pattern = pattern
        .strip_prefix("||")
        .or_else(|| pattern.strip_prefix('|'))
        .unwrap_or(pattern);
    let pattern = pattern.strip_suffix('^').unwrap_or(pattern);
    let pattern = pattern.strip_suffix('*').unwrap_or(pattern);

    if pattern.chars().count() < MIN_URL_FILTER_LEN {
        return Err(RuleError::PatternTooShort(pattern.to_string()));
    }

    Ok(pattern.to_string())
}

fn build_condition(url_filter: String, options: &ParsedOptions) -> RuleCondition {
    let resource_types = if options.types.is_empty() {
        DEFAULT_RESOURCE_TYPES.to_vec()
    } else {
        options.types.clone()
    };

    RuleCondition {
        url_filter,
        resource_types,
        initiator_domains: non_empty(&options.include_domains),
        excluded_initiator_domains: non_empty(&options.exclude_domains),
        domain_type: options.domain_type(),
    }
}

fn non_empty(domains: &[String]) -> Option<Vec<String>> {
    if domains.is_empty() {
        None
    } else {
        Some(domains.to_vec())
    }
}
