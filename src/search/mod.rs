//! Parallel content search over cached drawing objects
pub mod engine;
pub mod executors;
pub mod extractors;
pub mod observer;
pub mod service;
pub mod strategies;

use crate::error::{DrawingSearchError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub use engine::SearchEngine;
pub use strategies::MatchStrategy;

pub const CANNOT_SEARCH_WHILE_CACHING: &str = "Cannot search while caching";

/// What kind of drawing content a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchDomain {
    #[default]
    PartMark,
    Text,
    Assembly,
    /// Report positions of the cached assembly model objects.
    ModelObject,
}

impl fmt::Display for SearchDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchDomain::PartMark => write!(f, "part-mark"),
            SearchDomain::Text => write!(f, "text"),
            SearchDomain::Assembly => write!(f, "assembly"),
            SearchDomain::ModelObject => write!(f, "model-object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub case_sensitive: bool,
    pub wildcard: bool,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            case_sensitive: false,
            wildcard: false,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn wildcard(mut self, wildcard: bool) -> Self {
        self.wildcard = wildcard;
        self
    }
}

/// Search configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfiguration {
    pub term: String,
    pub case_sensitive: bool,
    pub wildcard: bool,
    pub strategies: Vec<MatchStrategy>,
    pub domain: SearchDomain,
    pub show_all_assembly_parts: bool,
}

impl SearchConfiguration {
    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(self.term.as_str())
            .case_sensitive(self.case_sensitive)
            .wildcard(self.wildcard)
    }

    pub fn validate(&self) -> Result<()> {
        if self.term.is_empty() {
            return Err(DrawingSearchError::InvalidConfiguration(
                "search term is empty".to_string(),
            ));
        }
        if self.strategies.is_empty() {
            return Err(DrawingSearchError::InvalidConfiguration(
                "no match strategies configured".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for SearchConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategies = self
            .strategies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "term={:?} case_sensitive={} wildcard={} strategies=[{}] domain={} show_all_assembly_parts={}",
            self.term,
            self.case_sensitive,
            self.wildcard,
            strategies,
            self.domain,
            self.show_all_assembly_parts
        )
    }
}

/// Fluent construction of a [`SearchConfiguration`].
///
/// ```
/// use drawing_search::search::{MatchStrategy, SearchBuilder, SearchDomain};
///
/// let config = SearchBuilder::new()
///     .with_query("B1")
///     .with_domain(SearchDomain::Assembly)
///     .add_strategy(MatchStrategy::Exact)
///     .build();
/// assert_eq!(config.strategies, vec![MatchStrategy::Exact]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchBuilder {
    term: String,
    case_sensitive: bool,
    wildcard: bool,
    strategies: Vec<MatchStrategy>,
    domain: SearchDomain,
    show_all_assembly_parts: bool,
}

impl SearchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn with_case_sensitivity(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_wildcard(mut self, wildcard: bool) -> Self {
        self.wildcard = wildcard;
        self
    }

    pub fn with_domain(mut self, domain: SearchDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn add_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn show_all_assembly_parts(mut self, show_all: bool) -> Self {
        self.show_all_assembly_parts = show_all;
        self
    }

    /// Falls back to [`MatchStrategy::defaults`] when no strategy was added.
    pub fn build(self) -> SearchConfiguration {
        let strategies = if self.strategies.is_empty() {
            MatchStrategy::defaults(self.wildcard)
        } else {
            self.strategies
        };
        SearchConfiguration {
            term: self.term,
            case_sensitive: self.case_sensitive,
            wildcard: self.wildcard,
            strategies,
            domain: self.domain,
            show_all_assembly_parts: self.show_all_assembly_parts,
        }
    }
}

/// Search result with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub match_count: usize,
    /// Assigned by the caller that timed the search.
    pub elapsed: Duration,
    pub domain: SearchDomain,
}

impl SearchResult {
    pub fn new(match_count: usize, domain: SearchDomain) -> Self {
        Self {
            match_count,
            elapsed: Duration::ZERO,
            domain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed(SearchResult),
    /// The cache was being written; nothing was searched.
    CacheBusy,
}

impl SearchOutcome {
    pub fn status_message(&self) -> String {
        match self {
            SearchOutcome::Completed(result) => format!(
                "Found {} match(es) in {} ms",
                result.match_count,
                result.elapsed.as_millis()
            ),
            SearchOutcome::CacheBusy => CANNOT_SEARCH_WHILE_CACHING.to_string(),
        }
    }

    pub fn result(&self) -> Option<&SearchResult> {
        match self {
            SearchOutcome::Completed(result) => Some(result),
            SearchOutcome::CacheBusy => None,
        }
    }
}
