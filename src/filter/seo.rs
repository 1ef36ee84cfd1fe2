use super::{link_document, tokenize, UrlFilter};
use crate::frontier::CandidateUrl;
use std::collections::HashSet;

/// Keyword-presence gate over a link's discoverable metadata
///
/// The signal is the fraction of configured keywords that appear as tokens in
/// the anchor text, the surrounding context or the URL path. Candidates pass
/// when the fraction reaches `threshold`. No keywords means no constraint.
#[derive(Debug, Clone)]
pub struct SeoFilter {
    keywords: Vec<String>,
    threshold: f64,
}

impl SeoFilter {
    pub fn new<S: AsRef<str>>(keywords: &[S], threshold: f64) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            threshold,
        }
    }

    /// Fraction of keywords found, in [0, 1]
    pub fn signal(&self, candidate: &CandidateUrl) -> f64 {
        if self.keywords.is_empty() {
            return 1.0;
        }
        let tokens: HashSet<String> = tokenize(&link_document(candidate, true))
            .into_iter()
            .collect();
        let found = self
            .keywords
            .iter()
            .filter(|k| keyword_present(k, &tokens))
            .count();
        found as f64 / self.keywords.len() as f64
    }
}

/// Multi-word keywords need every word present
fn keyword_present(keyword: &str, tokens: &HashSet<String>) -> bool {
    let words = tokenize(keyword);
    !words.is_empty() && words.iter().all(|w| tokens.contains(w))
}

impl UrlFilter for SeoFilter {
    fn name(&self) -> &str {
        "seo"
    }

    fn apply(&self, candidate: &CandidateUrl) -> bool {
        self.signal(candidate) >= self.threshold
    }
}
