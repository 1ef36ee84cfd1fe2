use super::Scorer;
use crate::filter::tokenize;
use crate::frontier::CandidateUrl;
use std::collections::HashSet;

/// Scores by the fraction of keywords found in anchor text and URL path
#[derive(Debug, Clone)]
pub struct KeywordRelevanceScorer {
    keywords: Vec<String>,
    weight: f64,
}

impl KeywordRelevanceScorer {
    pub fn new<S: AsRef<str>>(keywords: &[S], weight: f64) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            weight,
        }
    }
}

impl Scorer for KeywordRelevanceScorer {
    fn score(&self, candidate: &CandidateUrl) -> f64 {
        if self.keywords.is_empty() {
            return 0.0;
        }

        let mut haystack = candidate.path();
        if let Some(text) = candidate.anchor_text() {
            haystack.push(' ');
            haystack.push_str(text);
        }
        let tokens: HashSet<String> = tokenize(&haystack).into_iter().collect();

        let matched = self
            .keywords
            .iter()
            .filter(|k| {
                let words = tokenize(k);
                !words.is_empty() && words.iter().all(|w| tokens.contains(w))
            })
            .count();

        (matched as f64 / self.keywords.len() as f64 * self.weight).clamp(0.0, 1.0)
    }
}
