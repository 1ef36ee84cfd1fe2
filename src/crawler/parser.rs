//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow, with their anchor text
//! - Page title and meta description (used as link context by filters and scorers)

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    /// Absolute URL
    pub href: String,

    /// Whitespace-collapsed anchor text, if any
    pub text: Option<String>,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// The `<meta name="description">` content
    pub description: Option<String>,

    /// All links found on the page, in document order, without duplicates
    pub links: Vec<ParsedLink>,
}

impl ParsedPage {
    /// Title and description joined, used as context for every link on the page
    pub fn context(&self) -> Option<String> {
        match (&self.title, &self.description) {
            (Some(t), Some(d)) => Some(format!("{} {}", t, d)),
            (Some(t), None) => Some(t.clone()),
            (None, Some(d)) => Some(d.clone()),
            (None, None) => None,
        }
    }
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// `rel="nofollow"` links are followed.
///
/// # Example
///
/// ```
/// use ripple_crawl::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].href, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_description(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta[name='description'][content]").ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<ParsedLink> {
    let mut links: Vec<ParsedLink> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |link: ParsedLink| {
        if seen.insert(link.href.clone()) {
            links.push(link);
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    push(ParsedLink {
                        href: absolute_url,
                        text: anchor_text(&element),
                    });
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    push(ParsedLink {
                        href: absolute_url,
                        text: None,
                    });
                }
            }
        }
    }

    links
}

fn anchor_text(element: &ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<String>());
    if !text.is_empty() {
        return Some(text);
    }
    element
        .value()
        .attr("title")
        .or_else(|| element.value().attr("aria-label"))
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None for special schemes, fragment-only links, invalid URLs and
/// non-HTTP(S) URLs after resolution.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then(|| absolute_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    fn hrefs(parsed: &ParsedPage) -> Vec<&str> {
        parsed.links.iter().map(|l| l.href.as_str()).collect()
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let html = r#"<html><head><title>  Test
            Page  </title></head><body></body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(parsed.title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let html = r#"<html><head></head><body></body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.context(), None);
    }

    #[test]
    fn test_description_and_context() {
        let html = r#"<html><head><title>Docs</title>
            <meta name="description" content="Async Rust guide"></head><body></body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(parsed.description.as_deref(), Some("Async Rust guide"));
        assert_eq!(parsed.context().as_deref(), Some("Docs Async Rust guide"));
    }

    #[test]
    fn test_relative_links_and_anchor_text() {
        let html = r#"<html><body>
            <a href="/other">  Other
               page </a>
            <a href="sibling"><img src="x.png"></a>
            <a href="/titled" title="Titled link"></a>
        </body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(
            hrefs(&parsed),
            vec![
                "https://example.com/other",
                "https://example.com/sibling",
                "https://example.com/titled"
            ]
        );
        assert_eq!(parsed.links[0].text.as_deref(), Some("Other page"));
        assert_eq!(parsed.links[1].text, None);
        assert_eq!(parsed.links[2].text.as_deref(), Some("Titled link"));
    }

    #[test]
    fn test_skip_special_schemes() {
        let html = r#"<html><body>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:test@example.com">mail</a>
            <a href="tel:+1234567890">tel</a>
            <a href="data:text/html,<h1>x</h1>">data</a>
            <a href="ftp://example.com/file">ftp</a>
        </body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn test_skip_download_and_fragment() {
        let html = r##"<html><body>
            <a href="/file.pdf" download>Download</a>
            <a href="#section">Jump</a>
        </body></html>"##;
        let parsed = parse_html(html, &base_url());
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn test_follow_nofollow_links() {
        let html = r#"<html><body><a href="/page2" rel="nofollow">Link</a></body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(hrefs(&parsed), vec!["https://example.com/page2"]);
    }

    #[test]
    fn test_canonical_and_duplicates() {
        let html = r#"<html><head><link rel="canonical" href="https://example.com/a" /></head>
            <body><a href="/a">A</a><a href="/a">A again</a></body></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(hrefs(&parsed), vec!["https://example.com/a"]);
        assert_eq!(parsed.links[0].text.as_deref(), Some("A"));
    }

    #[test]
    fn test_large_page_dedup_keeps_first_seen_order() {
        let body: String = (0..2000)
            .map(|i| format!(r#"<a href="/p{}">P{}</a>"#, i % 500, i))
            .collect();
        let html = format!("<html><body>{}</body></html>", body);
        let parsed = parse_html(&html, &base_url());

        assert_eq!(parsed.links.len(), 500);
        assert_eq!(parsed.links[0].href, "https://example.com/p0");
        assert_eq!(parsed.links[0].text.as_deref(), Some("P0"));
        assert_eq!(parsed.links[499].href, "https://example.com/p499");
    }
}
