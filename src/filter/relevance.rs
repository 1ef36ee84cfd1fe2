use super::{link_document, tokenize, UrlFilter};
use crate::frontier::CandidateUrl;
use std::collections::HashMap;

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// BM25 relevance of a link's text and context to a fixed query
///
/// Each link is scored as a one-document corpus, so the length normalisation
/// factor is 1 and every matching query term carries the same idf.
#[derive(Debug, Clone)]
pub struct ContentRelevanceFilter {
    query_terms: Vec<String>,
    threshold: f64,
}

impl ContentRelevanceFilter {
    pub fn new(query: &str, threshold: f64) -> Self {
        let mut query_terms = tokenize(query);
        query_terms.sort();
        query_terms.dedup();
        Self {
            query_terms,
            threshold,
        }
    }

    /// BM25 score of the candidate's anchor text and context
    pub fn score(&self, candidate: &CandidateUrl) -> f64 {
        let terms = tokenize(&link_document(candidate, false));
        if terms.is_empty() {
            return 0.0;
        }

        let mut frequencies: HashMap<&str, f64> = HashMap::new();
        for term in &terms {
            *frequencies.entry(term.as_str()).or_insert(0.0) += 1.0;
        }

        let doc_len = terms.len() as f64;
        let avg_len = doc_len;
        let idf = (1.0 + 0.5 / 1.5_f64).ln();

        self.query_terms
            .iter()
            .filter_map(|q| frequencies.get(q.as_str()))
            .map(|&tf| {
                let norm = K1 * (1.0 - B + B * doc_len / avg_len);
                idf * tf * (K1 + 1.0) / (tf + norm)
            })
            .sum()
    }
}

impl UrlFilter for ContentRelevanceFilter {
    fn name(&self) -> &str {
        "content-relevance"
    }

    fn apply(&self, candidate: &CandidateUrl) -> bool {
        self.query_terms.is_empty() || self.score(candidate) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::Link;

    fn link(text: Option<&str>, context: Option<&str>) -> CandidateUrl {
        let parent = CandidateUrl::seed("https://example.com/").unwrap();
        let link = Link {
            href: "https://example.com/page".to_string(),
            text: text.map(String::from),
            context: context.map(String::from),
        };
        CandidateUrl::child(&parent, &link).unwrap()
    }

    #[test]
    fn test_more_matching_terms_score_higher() {
        let filter = ContentRelevanceFilter::new("async rust runtime", 0.0);
        let one = filter.score(&link(Some("rust book"), None));
        let two = filter.score(&link(Some("async rust book"), None));
        assert!(one > 0.0);
        assert!(two > one);
    }

    #[test]
    fn test_repeated_term_saturates() {
        let filter = ContentRelevanceFilter::new("rust", 0.0);
        let once = filter.score(&link(Some("rust"), None));
        let many = filter.score(&link(Some("rust rust rust rust"), None));
        let idf = (1.0 + 0.5 / 1.5_f64).ln();
        assert!(many > once);
        assert!(many < idf * (K1 + 1.0));
    }

    #[test]
    fn test_threshold_and_context() {
        let filter = ContentRelevanceFilter::new("tokio scheduler", 0.4);
        assert!(filter.apply(&link(Some("Read more"), Some("Inside the tokio scheduler"))));
        assert!(!filter.apply(&link(Some("Pricing"), Some("Plans and billing"))));
        assert!(!filter.apply(&link(None, None)));
    }

    #[test]
    fn test_empty_query_passes() {
        let filter = ContentRelevanceFilter::new("  ", 5.0);
        assert!(filter.apply(&link(None, None)));
    }
}
