use super::UrlFilter;
use crate::frontier::CandidateUrl;
use crate::url::compile_glob;
use crate::{ConfigError, ConfigResult};
use regex::Regex;

/// Accepts URLs matching any of a set of wildcard patterns
///
/// Patterns are tried against both the raw and the normalized URL. With
/// `reverse` set the filter becomes an exclusion list.
#[derive(Debug, Clone)]
pub struct UrlPatternFilter {
    patterns: Vec<Regex>,
    reverse: bool,
}

impl UrlPatternFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S], reverse: bool) -> ConfigResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                compile_glob(p.as_ref())
                    .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", p.as_ref(), e)))
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self { patterns, reverse })
    }

    fn matches(&self, candidate: &CandidateUrl) -> bool {
        self.patterns
            .iter()
            .any(|re| re.is_match(candidate.raw()) || re.is_match(candidate.normalized()))
    }
}

impl UrlFilter for UrlPatternFilter {
    fn name(&self) -> &str {
        "url-pattern"
    }

    fn apply(&self, candidate: &CandidateUrl) -> bool {
        self.matches(candidate) != self.reverse
    }
}
