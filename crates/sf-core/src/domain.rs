//! Hostname helpers shared by the cosmetic and scriptlet lookups.

/// Split a comma-separated domain prefix into (include, exclude) lists.
///
/// Tokens are trimmed and empty tokens dropped; a leading `~` marks an
/// exclusion and is stripped.
pub fn split_domain_list(prefix: &str) -> (Vec<String>, Vec<String>) {
    let mut include = Vec::new();
    let mut exclude = Vec::new();

    for raw in prefix.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        match token.strip_prefix('~') {
            Some(rest) if !rest.is_empty() => exclude.push(rest.to_string()),
            Some(_) => {}
            None => include.push(token.to_string()),
        }
    }

    (include, exclude)
}

/// True if `host` equals `domain` or is a subdomain of it.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.');
    let domain = domain.trim_end_matches('.');
    if domain.is_empty() || host.len() < domain.len() {
        return false;
    }
    if !host.ends_with(domain) {
        return false;
    }
    host.len() == domain.len() || host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

/// Domain scoping used by cosmetic rules and scriptlets: generic when no
/// include domains are given, and any matching exclude domain wins.
pub fn applies_to_host(host: &str, include: &[String], exclude: &[String]) -> bool {
    if exclude.iter().any(|d| host_matches(host, d)) {
        return false;
    }
    include.is_empty() || include.iter().any(|d| host_matches(host, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_include_and_exclude() {
        let (include, exclude) = split_domain_list("example.com, ~shop.example.com,,news.org,~");
        assert_eq!(include, vec!["example.com", "news.org"]);
        assert_eq!(exclude, vec!["shop.example.com"]);
    }

    #[test]
    fn empty_prefix_is_generic() {
        let (include, exclude) = split_domain_list("");
        assert!(include.is_empty());
        assert!(exclude.is_empty());
    }

    #[test]
    fn host_matching_respects_label_boundaries() {
        assert!(host_matches("example.com", "example.com"));
        assert!(host_matches("www.example.com", "example.com"));
        assert!(!host_matches("badexample.com", "example.com"));
        assert!(!host_matches("example.com", "www.example.com"));
        assert!(!host_matches("example.com", ""));
    }

    #[test]
    fn exclusion_beats_inclusion() {
        let include = vec!["example.com".to_string()];
        let exclude = vec!["shop.example.com".to_string()];
        assert!(applies_to_host("www.example.com", &include, &exclude));
        assert!(!applies_to_host("shop.example.com", &include, &exclude));
        assert!(applies_to_host("anything.org", &[], &[]));
        assert!(!applies_to_host("shop.example.com", &[], &exclude));
    }
}
