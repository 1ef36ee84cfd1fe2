use crate::crawler::Link;
use crate::url::{dedup_key, extract_domain};
use crate::UrlResult;
use url::Url;

/// A URL under consideration for crawling
///
/// The normalized form is the deduplication key. Candidates are immutable once
/// built; a score is attached by consuming the value with [`with_score`].
///
/// [`with_score`]: CandidateUrl::with_score
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateUrl {
    raw: String,
    normalized: String,
    parent_url: Option<String>,
    depth: u32,
    score: f64,
    anchor_text: Option<String>,
    context: Option<String>,
}

impl CandidateUrl {
    /// Builds a depth-0 candidate from a seed URL
    ///
    /// # Example
    ///
    /// ```
    /// use ripple_crawl::CandidateUrl;
    ///
    /// let seed = CandidateUrl::seed("https://www.example.com/#top").unwrap();
    /// assert_eq!(seed.normalized(), "https://example.com/");
    /// assert_eq!(seed.depth(), 0);
    /// ```
    pub fn seed(raw: &str) -> UrlResult<Self> {
        Ok(Self {
            raw: raw.to_string(),
            normalized: dedup_key(raw)?,
            parent_url: None,
            depth: 0,
            score: 0.0,
            anchor_text: None,
            context: None,
        })
    }

    /// Builds a candidate for a link discovered on `parent`
    pub fn child(parent: &CandidateUrl, link: &Link) -> UrlResult<Self> {
        Ok(Self {
            raw: link.href.clone(),
            normalized: dedup_key(&link.href)?,
            parent_url: Some(parent.normalized.clone()),
            depth: parent.depth + 1,
            score: 0.0,
            anchor_text: link.text.clone(),
            context: link.context.clone(),
        })
    }

    /// Returns the candidate with its score set
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Deduplication key
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn parent_url(&self) -> Option<&str> {
        self.parent_url.as_deref()
    }

    /// Hops from the seed (seeds are depth 0)
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Anchor text of the link that discovered this candidate
    pub fn anchor_text(&self) -> Option<&str> {
        self.anchor_text.as_deref()
    }

    /// Text around the discovering link
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Domain of the normalized URL, `www.` stripped
    pub fn domain(&self) -> Option<String> {
        Url::parse(&self.normalized)
            .ok()
            .as_ref()
            .and_then(extract_domain)
    }

    /// Path of the normalized URL
    pub fn path(&self) -> String {
        Url::parse(&self.normalized)
            .map(|u| u.path().to_string())
            .unwrap_or_default()
    }
}
