//! URL handling module
//!
//! This module provides URL normalization (the frontier's dedup key), domain
//! extraction and the wildcard matching used by domain and pattern filters.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::{domain_of, extract_domain, is_seed_domain};
pub use matcher::{compile_glob, matches_wildcard};
pub use normalize::{dedup_key, normalize_url};

/// Infers a MIME type from the extension of a URL path
///
/// Paths without an extension (or ending in `/`) are treated as HTML pages,
/// which is what a crawler following anchor links mostly encounters.
///
/// # Examples
///
/// ```
/// use ripple_crawl::url::infer_content_type;
///
/// assert_eq!(infer_content_type("https://example.com/docs/"), "text/html");
/// assert_eq!(infer_content_type("https://example.com/a.pdf"), "application/pdf");
/// ```
pub fn infer_content_type(url: &str) -> &'static str {
    let path = match ::url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };

    let last_segment = path.rsplit('/').next().unwrap_or("");
    let extension = match last_segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => return "text/html",
    };

    match extension.as_str() {
        "html" | "htm" | "shtml" | "php" | "asp" | "aspx" | "jsp" => "text/html",
        "xhtml" => "application/xhtml+xml",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" | "rss" | "atom" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensionless_is_html() {
        assert_eq!(infer_content_type("https://example.com/"), "text/html");
        assert_eq!(infer_content_type("https://example.com/guide"), "text/html");
        assert_eq!(
            infer_content_type("https://example.com/v1.2/guide"),
            "text/html"
        );
    }

    #[test]
    fn test_known_extensions() {
        assert_eq!(infer_content_type("https://example.com/a.PDF"), "application/pdf");
        assert_eq!(infer_content_type("https://example.com/a.png?x=1"), "image/png");
        assert_eq!(infer_content_type("https://example.com/index.htm"), "text/html");
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(
            infer_content_type("https://example.com/blob.bin"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_unparsable_falls_back_to_raw() {
        assert_eq!(infer_content_type("not a url/file.json"), "application/json");
    }
}
