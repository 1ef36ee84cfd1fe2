use regex::Regex;

/// Checks if a domain matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches the bare domain and any
///    subdomain at any nesting level
///
/// # Examples
///
/// ```
/// use ripple_crawl::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base
            || candidate
                .strip_suffix(base)
                .is_some_and(|prefix| prefix.ends_with('.'))
    } else {
        candidate == pattern
    }
}

/// Compiles a URL glob into an anchored regular expression
///
/// `*` matches any run of characters (including `/`), `?` matches a single
/// character, everything else is literal. Patterns without any wildcard are
/// treated as substrings, so `"/docs/"` matches every URL containing it.
///
/// # Errors
///
/// Returns the regex compilation error for pathological patterns.
pub fn compile_glob(pattern: &str) -> Result<Regex, regex::Error> {
    let has_wildcard = pattern.contains(['*', '?']);
    let mut expr = String::with_capacity(pattern.len() * 2 + 4);

    if has_wildcard {
        expr.push('^');
    }
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    if has_wildcard {
        expr.push('$');
    }

    Regex::new(&expr)
}
