use std::sync::OnceLock;

use regex::Regex;
use sf_core::domain::split_domain_list;
use sf_core::types::{CosmeticRule, Scriptlet};

use crate::parser::RuleError;
use crate::sequence::RuleIdSequence;

/// Cosmetic markers in the order they are tried when splitting a line.
const COSMETIC_MARKERS: [(&str, bool); 3] = [("#@#", true), ("##", false), ("#?#", false)];

pub fn is_cosmetic_line(line: &str) -> bool {
    line.contains("##") || line.contains("#@#") || line.contains("#?#")
}

pub fn is_scriptlet_line(line: &str) -> bool {
    line.contains("##+js(") || line.contains("#+js(")
}

fn scriptlet_regex() -> &'static Regex {
    static SCRIPTLET_RE: OnceLock<Regex> = OnceLock::new();
    SCRIPTLET_RE.get_or_init(|| Regex::new(r"(.*)#\+js\(([^)]+)\)").expect("scriptlet regex is valid"))
}

pub fn compile_cosmetic(
    line: &str,
    list_id: &str,
    ids: &mut RuleIdSequence,
) -> Result<CosmeticRule, RuleError> {
    let (prefix, selector, exception) = COSMETIC_MARKERS
        .iter()
        .find_map(|(marker, exception)| {
            line.split_once(marker)
                .map(|(prefix, selector)| (prefix, selector, *exception))
        })
        .ok_or(RuleError::MissingMarker)?;

    let selector = selector.trim();
    if selector.is_empty() {
        return Err(RuleError::EmptySelector);
    }

    let (domains, exclude_domains) = split_domain_list(prefix);

    Ok(CosmeticRule {
        id: format!("cosmetic_{}", ids.next_id()),
        list_id: list_id.to_string(),
        domains,
        exclude_domains,
        selector: selector.to_string(),
        exception,
    })
}

/// Compile a `domains#+js(name, arg1, arg2)` line.
///
/// Arguments are split on every comma; commas inside an argument are not
/// escapable.
pub fn compile_scriptlet(
    line: &str,
    list_id: &str,
    ids: &mut RuleIdSequence,
) -> Result<Scriptlet, RuleError> {
    let captures = scriptlet_regex()
        .captures(line)
        .ok_or(RuleError::MalformedScriptlet)?;

    let prefix = captures.get(1).map_or("", |m| m.as_str());
    let payload = captures.get(2).map_or("", |m| m.as_str());

    let mut parts = payload.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default();
    if name.is_empty() {
        return Err(RuleError::EmptyScriptletName);
    }
    let args: Vec<String> = parts.map(str::to_string).collect();

    let (domains, exclude_domains) = split_domain_list(prefix);

    Ok(Scriptlet {
        id: format!("scriptlet_{}", ids.next_id()),
        list_id: list_id.to_string(),
        domains,
        exclude_domains,
        name: name.to_string(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_domain_scoped_hiding_rule() {
        let mut ids = RuleIdSequence::new(1);
        let rule = compile_cosmetic("example.com##.ad-banner", "easylist", &mut ids).expect("valid");
        assert_eq!(rule.id, "cosmetic_1");
        assert_eq!(rule.list_id, "easylist");
        assert_eq!(rule.domains, vec!["example.com"]);
        assert!(rule.exclude_domains.is_empty());
        assert_eq!(rule.selector, ".ad-banner");
        assert!(!rule.exception);
    }

    #[test]
    fn exception_marker_wins_over_hiding_marker() {
        let mut ids = RuleIdSequence::new(1);
        let rule = compile_cosmetic("a.com,~b.a.com#@#div##x", "l", &mut ids).expect("valid");
        assert!(rule.exception);
        assert_eq!(rule.domains, vec!["a.com"]);
        assert_eq!(rule.exclude_domains, vec!["b.a.com"]);
        assert_eq!(rule.selector, "div##x");
    }

    #[test]
    fn selector_keeps_everything_after_first_marker() {
        let mut ids = RuleIdSequence::new(1);
        let rule = compile_cosmetic("##div[title='a##b']", "l", &mut ids).expect("valid");
        assert!(rule.domains.is_empty());
        assert_eq!(rule.selector, "div[title='a##b']");
    }

    #[test]
    fn procedural_marker_is_plain_cosmetic() {
        let mut ids = RuleIdSequence::new(1);
        let rule = compile_cosmetic("site.org#?#div:has(> .ad)", "l", &mut ids).expect("valid");
        assert_eq!(rule.selector, "div:has(> .ad)");
        assert!(!rule.exception);
    }

    #[test]
    fn empty_selector_is_rejected_without_consuming_an_id() {
        let mut ids = RuleIdSequence::new(7);
        assert_eq!(compile_cosmetic("example.com##", "l", &mut ids), Err(RuleError::EmptySelector));
        assert_eq!(ids.peek(), 7);
    }

    #[test]
    fn compiles_scriptlet_with_arguments() {
        let mut ids = RuleIdSequence::new(1);
        let scriptlet = compile_scriptlet(
            "example.com,~sub.example.com#+js(set-constant, ads.enabled, false)",
            "ubo",
            &mut ids,
        )
        .expect("valid");
        assert_eq!(scriptlet.id, "scriptlet_1");
        assert_eq!(scriptlet.domains, vec!["example.com"]);
        assert_eq!(scriptlet.exclude_domains, vec!["sub.example.com"]);
        assert_eq!(scriptlet.name, "set-constant");
        assert_eq!(scriptlet.args, vec!["ads.enabled", "false"]);
    }

    #[test]
    fn scriptlet_args_split_on_embedded_commas() {
        let mut ids = RuleIdSequence::new(1);
        let scriptlet = compile_scriptlet("#+js(json-prune, a\\, b)", "l", &mut ids).expect("valid");
        assert!(scriptlet.domains.is_empty());
        assert_eq!(scriptlet.args, vec!["a\\", "b"]);
    }

    #[test]
    fn malformed_scriptlets_are_rejected() {
        let mut ids = RuleIdSequence::new(1);
        assert_eq!(compile_scriptlet("a.com#+js()", "l", &mut ids), Err(RuleError::MalformedScriptlet));
        assert_eq!(compile_scriptlet("a.com#+js( , x)", "l", &mut ids), Err(RuleError::EmptyScriptletName));
        assert_eq!(ids.peek(), 1);
    }
}
