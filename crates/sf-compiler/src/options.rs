use sf_core::types::{DomainType, ResourceMask, ResourceType};

/// Options parsed from the text after a rule's first `$`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOptions {
    /// Explicit resource types, in first-appearance order.
    pub types: Vec<ResourceType>,
    pub include_domains: Vec<String>,
    pub exclude_domains: Vec<String>,
    /// `Some(true)` for `third-party`, `Some(false)` for `~third-party` / `first-party`.
    pub third_party: Option<bool>,
    pub important: bool,
    /// `~type` negations. Recorded only; compiled rules ignore them.
    pub negated_types: ResourceMask,
    /// Tokens that matched nothing in the option table.
    pub unknown: Vec<String>,
}

impl ParsedOptions {
    pub fn domain_type(&self) -> Option<DomainType> {
        self.third_party.map(|third| {
            if third {
                DomainType::ThirdParty
            } else {
                DomainType::FirstParty
            }
        })
    }
}

/// Split a rule at its first `$` into pattern and options text.
pub fn split_rule_options(line: &str) -> (&str, Option<&str>) {
    match line.find('$') {
        Some(pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    }
}

/// Parse the text after `$`. Tokens are matched case-insensitively and
/// `domain=` values come out lowercased, as the engine compares hosts.
pub fn parse_options(text: &str) -> ParsedOptions {
    let mut options = ParsedOptions::default();
    let mut seen = ResourceMask::empty();

    for raw in text.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let lower = raw.to_ascii_lowercase();
        let token = lower.as_str();

        if let Some(value) = token.strip_prefix("domain=") {
            parse_domain_option(value, &mut options);
            continue;
        }

        match token {
            "third-party" => {
                options.third_party = Some(true);
                continue;
            }
            "~third-party" | "first-party" => {
                options.third_party = Some(false);
                continue;
            }
            "important" => {
                options.important = true;
                continue;
            }
            _ => {}
        }

        if let Some(name) = token.strip_prefix('~') {
            match ResourceType::from_abp_name(name) {
                Some(ty) => options.negated_types |= ty.mask(),
                None => options.unknown.push(raw.to_string()),
            }
            continue;
        }

        match ResourceType::from_abp_name(token) {
            Some(ty) => {
                if !seen.contains(ty.mask()) {
                    seen |= ty.mask();
                    options.types.push(ty);
                }
            }
            None => options.unknown.push(raw.to_string()),
        }
    }

    options
}

fn parse_domain_option(value: &str, options: &mut ParsedOptions) {
    for raw in value.split('|') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        match raw.strip_prefix('~') {
            Some(rest) if !rest.is_empty() => options.exclude_domains.push(rest.to_string()),
            Some(_) => {}
            None => options.include_domains.push(raw.to_string()),
        }
    }
}
