//! Match strategies: pure predicates over `(extracted string, query)`
use crate::error::Result;
use crate::search::SearchQuery;
use clap::ValueEnum;
use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Trait for match strategies
pub trait SearchStrategy: Send + Sync {
    fn matches(&self, data: &str, query: &SearchQuery) -> bool;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Whole-string equality, always ignoring case
    Exact,
    /// Substring test honouring the query's case flag
    Contains,
    /// Term used directly as a regular expression
    Regex,
    /// `*` and `?` wildcards, anchored at both ends
    Wildcard,
}

impl MatchStrategy {
    /// Strategies used when a configuration names none.
    pub fn defaults(wildcard: bool) -> Vec<MatchStrategy> {
        if wildcard {
            vec![MatchStrategy::Wildcard]
        } else {
            vec![MatchStrategy::Regex]
        }
    }

    /// Prepares this strategy for repeated use against one query.
    pub fn compile(self, query: &SearchQuery, cache: Option<&RegexCache>) -> Result<CompiledMatcher> {
        let matcher = match self {
            MatchStrategy::Exact => CompiledMatcher::Exact {
                term: query.term.to_lowercase(),
            },
            MatchStrategy::Contains => CompiledMatcher::Contains {
                needle: if query.case_sensitive {
                    query.term.clone()
                } else {
                    query.term.to_lowercase()
                },
                case_sensitive: query.case_sensitive,
            },
            MatchStrategy::Regex => {
                CompiledMatcher::Pattern(compile_pattern(&query.term, query.case_sensitive, cache)?)
            }
            MatchStrategy::Wildcard => {
                let pattern = wildcard_to_regex(&query.term);
                CompiledMatcher::Pattern(compile_pattern(&pattern, query.case_sensitive, cache)?)
            }
        };
        Ok(matcher)
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl SearchStrategy for MatchStrategy {
    fn matches(&self, data: &str, query: &SearchQuery) -> bool {
        self.compile(query, None)
            .map(|matcher| matcher.is_match(data))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Contains => "contains",
            MatchStrategy::Regex => "regex",
            MatchStrategy::Wildcard => "wildcard",
        }
    }
}

/// A strategy bound to one query.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Exact { term: String },
    Contains { needle: String, case_sensitive: bool },
    Pattern(Arc<Regex>),
}

impl CompiledMatcher {
    pub fn is_match(&self, data: &str) -> bool {
        match self {
            CompiledMatcher::Exact { term } => data.to_lowercase() == *term,
            CompiledMatcher::Contains {
                needle,
                case_sensitive: true,
            } => data.contains(needle.as_str()),
            CompiledMatcher::Contains { needle, .. } => data.to_lowercase().contains(needle.as_str()),
            CompiledMatcher::Pattern(regex) => regex.is_match(data),
        }
    }
}

/// Translates a `*`/`?` wildcard term into an anchored regular expression.
pub fn wildcard_to_regex(wildcard: &str) -> String {
    let escaped = regex::escape(wildcard)
        .replace(r"\?", ".")
        .replace(r"\*", ".*");
    format!("^{escaped}$")
}

fn compile_pattern(pattern: &str, case_sensitive: bool, cache: Option<&RegexCache>) -> Result<Arc<Regex>> {
    match cache {
        Some(cache) => cache.get_or_compile(pattern, case_sensitive),
        None => Ok(Arc::new(build_regex(pattern, case_sensitive)?)),
    }
}

fn build_regex(pattern: &str, case_sensitive: bool) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()?)
}

/// Compiled pattern cache shared by every search
pub struct RegexCache {
    patterns: Mutex<LruCache<(String, bool), Arc<Regex>>>,
}

impl RegexCache {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            patterns: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_or_compile(&self, pattern: &str, case_sensitive: bool) -> Result<Arc<Regex>> {
        let key = (pattern.to_string(), case_sensitive);
        if let Some(regex) = self.patterns.lock().get(&key) {
            return Ok(regex.clone());
        }

        let regex = Arc::new(build_regex(pattern, case_sensitive)?);
        self.patterns.lock().put(key, regex.clone());
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.patterns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.lock().is_empty()
    }

    pub fn clear(&self) {
        self.patterns.lock().clear();
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
