//! Search entry point exposed to callers
use crate::cache::CacheService;
use crate::error::{DrawingSearchError, Result};
use crate::metrics::Metrics;
use crate::search::executors::{default_executors, ExecutorContext, SearchExecutor};
use crate::search::{SearchConfiguration, SearchDomain, SearchOutcome};
use log::{error, info};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Dispatches searches to the executor of their domain, at most one at a
/// time per drawing, and never while the cache is being written.
#[derive(Clone)]
pub struct DrawingSearchService {
    cache: Arc<CacheService>,
    executors: Arc<HashMap<SearchDomain, Arc<dyn SearchExecutor>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    metrics: Arc<Metrics>,
}

impl DrawingSearchService {
    pub fn new(context: ExecutorContext) -> Self {
        let cache = context.cache().clone();
        Self::with_executors(cache, default_executors(context))
    }

    pub fn with_executors(
        cache: Arc<CacheService>,
        executors: HashMap<SearchDomain, Arc<dyn SearchExecutor>>,
    ) -> Self {
        let metrics = cache.metrics().clone();
        Self {
            cache,
            executors: Arc::new(executors),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    /// Runs `config` on a blocking worker of the current tokio runtime.
    pub async fn execute_search(&self, config: SearchConfiguration) -> Result<SearchOutcome> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.execute_search_blocking(&config))
            .await
            .map_err(|e| DrawingSearchError::Other(format!("search task failed: {e}")))?
    }

    pub fn execute_search_blocking(&self, config: &SearchConfiguration) -> Result<SearchOutcome> {
        let drawing_id = self.cache.active_drawing_id()?;
        config.validate()?;
        let executor = self.executors.get(&config.domain).cloned().ok_or_else(|| {
            DrawingSearchError::InvalidConfiguration(format!(
                "unsupported search domain {}",
                config.domain
            ))
        })?;

        if self.cache.is_caching() {
            self.metrics.searches_rejected.inc();
            info!("Search on drawing {drawing_id} rejected: cache is busy");
            return Ok(SearchOutcome::CacheBusy);
        }

        let _slot = SearchSlot::claim(&self.in_flight, &drawing_id)?;
        let start = Instant::now();
        match executor.execute(config, &drawing_id) {
            Ok(mut result) => {
                result.elapsed = start.elapsed();
                self.metrics.searches_executed.inc();
                self.metrics.matches_found.inc_by(result.match_count as u64);
                info!(
                    "Search [{config}] on drawing {drawing_id}: {} match(es) in {} ms",
                    result.match_count,
                    result.elapsed.as_millis()
                );
                Ok(SearchOutcome::Completed(result))
            }
            Err(e) => {
                error!("Search [{config}] on drawing {drawing_id} failed: {e}");
                Err(e)
            }
        }
    }
}

/// Marks a drawing as being searched until dropped.
struct SearchSlot {
    drawings: Arc<Mutex<HashSet<String>>>,
    drawing_id: String,
}

impl SearchSlot {
    fn claim(drawings: &Arc<Mutex<HashSet<String>>>, drawing_id: &str) -> Result<Self> {
        if !drawings.lock().insert(drawing_id.to_string()) {
            return Err(DrawingSearchError::SearchInProgress(drawing_id.to_string()));
        }
        Ok(Self {
            drawings: drawings.clone(),
            drawing_id: drawing_id.to_string(),
        })
    }
}

impl Drop for SearchSlot {
    fn drop(&mut self) {
        self.drawings.lock().remove(&self.drawing_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::snapshot::SnapshotDrawing;
    use crate::host::{HostResultSelector, SnapshotHost};
    use crate::model::{DrawingObject, Mark};
    use crate::search::{SearchBuilder, CANNOT_SEARCH_WHILE_CACHING};

    fn service() -> (DrawingSearchService, Arc<SnapshotHost>) {
        let host = Arc::new(SnapshotHost::with_drawing(
            SnapshotDrawing::new("42")
                .with_object(DrawingObject::Mark(Mark::with_text("1", "ABC123")))
                .with_object(DrawingObject::Mark(Mark::with_text("2", "XYZ"))),
        ));
        let cache = Arc::new(CacheService::new(host.clone(), Arc::new(Metrics::new())));
        cache.cache_drawing("42").unwrap();
        let selector = Arc::new(HostResultSelector::new(host.clone()));
        (DrawingSearchService::new(ExecutorContext::new(cache, selector)), host)
    }

    fn query(term: &str) -> SearchConfiguration {
        SearchBuilder::new().with_query(term).build()
    }

    #[test]
    fn completed_search_is_timed_counted_and_selected() {
        let (service, host) = service();
        let outcome = service.execute_search_blocking(&query("^ABC")).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.match_count, 1);
        assert_eq!(host.selected(), vec!["1".into()]);
        assert_eq!(service.metrics.searches_executed.get(), 1);
        assert_eq!(service.metrics.matches_found.get(), 1);
        assert!(service.in_flight.lock().is_empty());
    }

    #[test]
    fn no_active_drawing_is_host_unavailable() {
        let (service, host) = service();
        host.set_active_drawing(None);
        assert!(matches!(
            service.execute_search_blocking(&query("A")),
            Err(DrawingSearchError::HostUnavailable(_))
        ));
    }

    #[test]
    fn invalid_configuration_is_rejected_synchronously() {
        let (service, _) = service();
        assert!(matches!(
            service.execute_search_blocking(&query("")),
            Err(DrawingSearchError::InvalidConfiguration(_))
        ));

        let only_marks = DrawingSearchService::with_executors(service.cache().clone(), HashMap::new());
        assert!(matches!(
            only_marks.execute_search_blocking(&query("A")),
            Err(DrawingSearchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn searches_are_refused_while_caching() {
        let (service, _) = service();
        let guard = service.cache().cache().state().begin_caching();
        let outcome = service.execute_search_blocking(&query("ABC")).unwrap();
        assert_eq!(outcome, SearchOutcome::CacheBusy);
        assert_eq!(outcome.status_message(), CANNOT_SEARCH_WHILE_CACHING);
        assert_eq!(service.metrics.searches_rejected.get(), 1);
        guard.finish();

        assert!(service.execute_search_blocking(&query("ABC")).unwrap().result().is_some());
    }

    #[test]
    fn one_search_per_drawing() {
        let (service, _) = service();
        service.in_flight.lock().insert("42".to_string());
        assert!(matches!(
            service.execute_search_blocking(&query("ABC")),
            Err(DrawingSearchError::SearchInProgress(_))
        ));
    }

    #[tokio::test]
    async fn async_search_runs_on_blocking_worker() {
        let (service, _) = service();
        let outcome = service.execute_search(query("xyz")).await.unwrap();
        assert_eq!(outcome.result().map(|r| r.match_count), Some(1));
    }
}
