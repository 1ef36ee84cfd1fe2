use super::UrlFilter;
use crate::frontier::CandidateUrl;
use crate::url::matches_wildcard;

/// Domain allow and block lists
///
/// Entries may be exact (`example.com`) or wildcard (`*.example.com`).
/// Blocking wins over allowing; an empty allow list allows every domain that
/// is not blocked. Candidates without a domain are rejected.
#[derive(Debug, Clone, Default)]
pub struct DomainFilter {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl DomainFilter {
    pub fn new<S: AsRef<str>>(allowed: &[S], blocked: &[S]) -> Self {
        Self {
            allowed: allowed.iter().map(|d| clean(d.as_ref())).collect(),
            blocked: blocked.iter().map(|d| clean(d.as_ref())).collect(),
        }
    }
}

fn clean(entry: &str) -> String {
    let lower = entry.trim().to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

impl UrlFilter for DomainFilter {
    fn name(&self) -> &str {
        "domain"
    }

    fn apply(&self, candidate: &CandidateUrl) -> bool {
        let Some(domain) = candidate.domain() else {
            return false;
        };

        if self.blocked.iter().any(|p| matches_wildcard(p, &domain)) {
            return false;
        }

        self.allowed.is_empty() || self.allowed.iter().any(|p| matches_wildcard(p, &domain))
    }
}
