//! URL scorers
//!
//! A scorer maps a candidate to a relevance score in [0, 1]. Scorers are pure:
//! they see only the candidate and never touch frontier state.

mod domain_authority;
mod keyword;
mod path_depth;

pub use domain_authority::DomainAuthorityScorer;
pub use keyword::KeywordRelevanceScorer;
pub use path_depth::PathDepthScorer;

use crate::frontier::CandidateUrl;
use std::fmt;
use std::sync::Arc;

/// Relevance score for a candidate URL
pub trait Scorer: Send + Sync {
    fn score(&self, candidate: &CandidateUrl) -> f64;
}

/// Weighted sum of scorers, clamped to [0, 1]
///
/// Weights need not sum to 1.
#[derive(Clone, Default)]
pub struct CompositeScorer {
    parts: Vec<(Arc<dyn Scorer>, f64)>,
}

impl CompositeScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scorer with its weight, builder style
    pub fn with(mut self, scorer: impl Scorer + 'static, weight: f64) -> Self {
        self.add(Arc::new(scorer), weight);
        self
    }

    pub fn add(&mut self, scorer: Arc<dyn Scorer>, weight: f64) {
        self.parts.push((scorer, weight));
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Scorer for CompositeScorer {
    fn score(&self, candidate: &CandidateUrl) -> f64 {
        let total: f64 = self
            .parts
            .iter()
            .map(|(scorer, weight)| scorer.score(candidate) * weight)
            .sum();
        if total.is_nan() {
            return 0.0;
        }
        total.clamp(0.0, 1.0)
    }
}

impl fmt::Debug for CompositeScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeScorer")
            .field("weights", &self.parts.iter().map(|(_, w)| *w).collect::<Vec<_>>())
            .finish()
    }
}
