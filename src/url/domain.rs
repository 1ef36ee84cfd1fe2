use std::collections::HashSet;
use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL, lowercases it and strips
/// a leading `www.` so it lines up with [`normalize_url`](super::normalize_url).
/// Returns None for URLs without a host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let lower = h.to_lowercase();
        match lower.strip_prefix("www.") {
            Some(stripped) => stripped.to_string(),
            None => lower,
        }
    })
}

/// Parses a raw URL string and extracts its domain
pub fn domain_of(raw: &str) -> Option<String> {
    Url::parse(raw).ok().as_ref().and_then(extract_domain)
}

/// Returns true if `domain` belongs to one of the seed domains
///
/// Subdomains of a seed count as the same site, so a crawl seeded at
/// `example.com` follows links to `docs.example.com`.
pub fn is_seed_domain(domain: &str, seed_domains: &HashSet<String>) -> bool {
    seed_domains.iter().any(|seed| {
        domain == seed
            || domain
                .strip_suffix(seed.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}
