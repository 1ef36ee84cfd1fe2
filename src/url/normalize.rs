//! Canonical URL forms
//!
//! Two links that reach the same page should collapse onto one frontier
//! entry. `Url::parse` already lowercases the host and resolves `.`/`..`
//! segments; on top of that the key drops `www.`, the fragment, tracking
//! parameters, empty path segments and trailing slashes, and puts the
//! query into a stable order. The scheme and port stay part of the key.

use crate::{UrlError, UrlResult};
use url::form_urlencoded;
use url::Url;

/// Query parameters that only identify the referrer
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

/// Parses `raw` and rewrites it into its canonical form
///
/// # Examples
///
/// ```
/// use ripple_crawl::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.COM/page/#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(raw: &str) -> UrlResult<Url> {
    let mut url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?;
    if let Some(bare) = host.strip_prefix("www.") {
        let bare = bare.to_string();
        url.set_host(Some(&bare))
            .map_err(|e| UrlError::Malformed(e.to_string()))?;
    }

    let path = canonical_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    let query = canonical_query(&url);
    url.set_query(query.as_deref());

    Ok(url)
}

/// The string the frontier deduplicates on
///
/// ```
/// use ripple_crawl::url::dedup_key;
///
/// assert_eq!(
///     dedup_key("https://www.example.com/docs/?b=2&a=1#intro").unwrap(),
///     dedup_key("https://example.com/docs?a=1&b=2&utm_source=feed").unwrap(),
/// );
/// ```
pub fn dedup_key(raw: &str) -> UrlResult<String> {
    normalize_url(raw).map(String::from)
}

fn canonical_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Remaining parameters sorted by key, or `None` when nothing is left
fn canonical_query(url: &Url) -> Option<String> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(pairs);
    Some(serializer.finish())
}
