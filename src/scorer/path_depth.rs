use super::Scorer;
use crate::frontier::CandidateUrl;

/// Prefers URLs whose path depth is close to an optimal depth
///
/// A path at the optimal depth scores `weight`; each segment of distance
/// halves the score.
#[derive(Debug, Clone)]
pub struct PathDepthScorer {
    optimal_depth: usize,
    weight: f64,
}

impl PathDepthScorer {
    pub fn new(optimal_depth: usize, weight: f64) -> Self {
        Self {
            optimal_depth,
            weight,
        }
    }
}

fn path_depth(path: &str) -> usize {
    path.split('/').filter(|s| !s.is_empty()).count()
}

impl Scorer for PathDepthScorer {
    fn score(&self, candidate: &CandidateUrl) -> f64 {
        let distance = path_depth(&candidate.path()).abs_diff(self.optimal_depth);
        let decay = 1.0 / (1u64 << distance.min(32)) as f64;
        (decay * self.weight).clamp(0.0, 1.0)
    }
}
