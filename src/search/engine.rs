//! Core search engine implementation
use crate::error::Result;
use crate::search::extractors::DataExtractor;
use crate::search::observer::Observer;
use crate::search::strategies::{CompiledMatcher, MatchStrategy, RegexCache};
use crate::search::SearchQuery;
use log::{debug, trace};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Generic data-parallel search with observer notification.
///
/// Items are split into fixed-size chunks processed across the thread pool.
/// An item matches when any configured strategy accepts its extracted
/// string. Matches are gathered per chunk and merged once all chunks finish,
/// so the returned order is unspecified.
pub struct SearchEngine<T> {
    strategies: Vec<MatchStrategy>,
    extractor: Arc<dyn DataExtractor<T>>,
    observers: Vec<Arc<dyn Observer<T>>>,
    chunk_size: usize,
    pool: Option<Arc<ThreadPool>>,
    regex_cache: Option<Arc<RegexCache>>,
}

impl<T> SearchEngine<T>
where
    T: Clone + Send + Sync,
{
    pub fn new<X>(strategies: Vec<MatchStrategy>, extractor: X) -> Self
    where
        X: DataExtractor<T> + 'static,
    {
        Self {
            strategies,
            extractor: Arc::new(extractor),
            observers: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            pool: None,
            regex_cache: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Runs searches on `pool` instead of the global rayon pool.
    pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_regex_cache(mut self, cache: Arc<RegexCache>) -> Self {
        self.regex_cache = Some(cache);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn subscribe(&mut self, observer: Arc<dyn Observer<T>>) {
        self.observers.push(observer);
    }

    /// Removes `observer` by identity. Returns whether it was subscribed.
    pub fn unsubscribe(&mut self, observer: &Arc<dyn Observer<T>>) -> bool {
        let before = self.observers.len();
        self.observers
            .retain(|o| !std::ptr::addr_eq(Arc::as_ptr(o), Arc::as_ptr(observer)));
        self.observers.len() != before
    }

    pub fn search(&self, items: &[T], query: &SearchQuery) -> Result<Vec<T>> {
        let start = Instant::now();
        let matchers = self
            .strategies
            .iter()
            .map(|strategy| strategy.compile(query, self.regex_cache.as_deref()))
            .collect::<Result<Vec<_>>>()?;

        if items.is_empty() || matchers.is_empty() {
            return Ok(Vec::new());
        }

        let run = || {
            items
                .par_chunks(self.chunk_size)
                .map(|chunk| self.search_chunk(chunk, &matchers))
                .reduce(Vec::new, |mut merged, mut partial| {
                    merged.append(&mut partial);
                    merged
                })
        };
        let matches = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        debug!(
            "Searched {} item(s) for {:?}: {} match(es) in {:.2?}",
            items.len(),
            query.term,
            matches.len(),
            start.elapsed()
        );
        Ok(matches)
    }

    fn search_chunk(&self, chunk: &[T], matchers: &[CompiledMatcher]) -> Vec<T> {
        let mut found = Vec::new();
        for item in chunk {
            let data = self.extractor.extract(item);
            if !matchers.iter().any(|matcher| matcher.is_match(&data)) {
                continue;
            }
            trace!("Matched content {data:?}");
            self.notify(item);
            found.push(item.clone());
        }
        found
    }

    fn notify(&self, item: &T) {
        for observer in &self.observers {
            observer.on_match_found(item);
        }
    }
}
