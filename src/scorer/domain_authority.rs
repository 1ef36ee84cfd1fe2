use super::Scorer;
use crate::frontier::CandidateUrl;
use crate::url::matches_wildcard;
use std::collections::HashMap;

/// Configured per-domain weights with a fallback
///
/// Keys may be wildcard patterns (`*.example.com`); an exact key wins over a
/// wildcard one.
#[derive(Debug, Clone)]
pub struct DomainAuthorityScorer {
    weights: HashMap<String, f64>,
    default_weight: f64,
}

impl DomainAuthorityScorer {
    pub fn new(weights: HashMap<String, f64>, default_weight: f64) -> Self {
        let weights = weights
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Self {
            weights,
            default_weight,
        }
    }
}

impl Scorer for DomainAuthorityScorer {
    fn score(&self, candidate: &CandidateUrl) -> f64 {
        let Some(domain) = candidate.domain() else {
            return self.default_weight.clamp(0.0, 1.0);
        };

        let weight = self.weights.get(&domain).copied().or_else(|| {
            self.weights
                .iter()
                .filter(|(pattern, _)| pattern.starts_with("*.") && matches_wildcard(pattern, &domain))
                .map(|(_, w)| *w)
                .reduce(f64::max)
        });

        weight.unwrap_or(self.default_weight).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> DomainAuthorityScorer {
        DomainAuthorityScorer::new(
            HashMap::from([
                ("docs.rs".to_string(), 0.9),
                ("*.example.com".to_string(), 0.6),
                ("blog.example.com".to_string(), 0.3),
            ]),
            0.1,
        )
    }

    fn score(url: &str) -> f64 {
        scorer().score(&CandidateUrl::seed(url).unwrap())
    }

    #[test]
    fn test_exact_and_wildcard() {
        assert_eq!(score("https://docs.rs/tokio"), 0.9);
        assert_eq!(score("https://api.example.com/"), 0.6);
        assert_eq!(score("https://blog.example.com/"), 0.3);
    }

    #[test]
    fn test_default_weight() {
        assert_eq!(score("https://unknown.org/"), 0.1);
    }
}
