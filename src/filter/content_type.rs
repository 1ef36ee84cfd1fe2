use super::UrlFilter;
use crate::frontier::CandidateUrl;
use crate::url::infer_content_type;

/// Accepts URLs whose inferred content type is on the allow list
///
/// The type is guessed from the path extension only; no request is made.
/// Entries ending in `/*` match a whole family (`text/*`).
#[derive(Debug, Clone)]
pub struct ContentTypeFilter {
    allowed: Vec<String>,
}

impl ContentTypeFilter {
    pub fn new<S: AsRef<str>>(allowed: &[S]) -> Self {
        Self {
            allowed: allowed
                .iter()
                .map(|t| t.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl UrlFilter for ContentTypeFilter {
    fn name(&self) -> &str {
        "content-type"
    }

    fn apply(&self, candidate: &CandidateUrl) -> bool {
        let inferred = infer_content_type(candidate.normalized());
        self.allowed.iter().any(|allowed| match allowed.strip_suffix("/*") {
            Some(family) => inferred
                .split_once('/')
                .is_some_and(|(major, _)| major == family),
            None => allowed == inferred,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str) -> CandidateUrl {
        CandidateUrl::seed(url).unwrap()
    }

    #[test]
    fn test_html_only() {
        let filter = ContentTypeFilter::new(&["text/html"]);
        assert!(filter.apply(&candidate("https://example.com/docs/")));
        assert!(filter.apply(&candidate("https://example.com/index.php?id=3")));
        assert!(!filter.apply(&candidate("https://example.com/report.pdf")));
        assert!(!filter.apply(&candidate("https://example.com/logo.png")));
    }

    #[test]
    fn test_family_wildcard() {
        let filter = ContentTypeFilter::new(&["image/*"]);
        assert!(filter.apply(&candidate("https://example.com/logo.PNG")));
        assert!(!filter.apply(&candidate("https://example.com/")));
    }
}
