//! Cache façade used by host event handlers and search executors
use crate::cache::history::DrawingHistory;
use crate::cache::keys::{CacheKey, CacheKeyGenerator};
use crate::cache::object_cache::{IngestReport, ObjectCache};
use crate::cache::state::CacheState;
use crate::error::{DrawingSearchError, Result};
use crate::host::CadHost;
use crate::metrics::Metrics;
use crate::model::SharedObject;
use crate::search::observer::Observer;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_REFRESH_RETRIES: usize = 3;

pub struct CacheService {
    cache: Arc<ObjectCache>,
    host: Arc<dyn CadHost>,
    keys: CacheKeyGenerator,
    history: Mutex<DrawingHistory>,
    metrics: Arc<Metrics>,
    refresh_retries: usize,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl CacheService {
    pub fn new(host: Arc<dyn CadHost>, metrics: Arc<Metrics>) -> Self {
        Self::with_cache(Arc::new(ObjectCache::new()), host, metrics)
    }

    pub fn with_cache(cache: Arc<ObjectCache>, host: Arc<dyn CadHost>, metrics: Arc<Metrics>) -> Self {
        Self {
            cache,
            host,
            keys: CacheKeyGenerator::new(),
            history: Mutex::new(DrawingHistory::new()),
            metrics,
            refresh_retries: DEFAULT_REFRESH_RETRIES,
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_refresh_retries(mut self, retries: usize) -> Self {
        self.refresh_retries = retries;
        self
    }

    pub fn cache(&self) -> &Arc<ObjectCache> {
        &self.cache
    }

    pub fn host(&self) -> &Arc<dyn CadHost> {
        &self.host
    }

    pub fn active_drawing_id(&self) -> Result<String> {
        self.host
            .active_drawing_id()
            .ok_or_else(|| DrawingSearchError::HostUnavailable("no active drawing".to_string()))
    }

    /// Full enumeration of a drawing into the cache.
    pub fn cache_drawing(&self, drawing_id: &str) -> Result<IngestReport> {
        let report = self.cache.bulk_ingest(self.host.as_ref(), drawing_id, false)?;
        self.record(drawing_id, &report);
        Ok(report)
    }

    /// Prunes unrelated entries and re-ingests `drawing_id`. Fails with
    /// [`DrawingSearchError::CancelledRefresh`] when `cancel` is signalled
    /// before the cache is written.
    pub fn refresh_cache(
        &self,
        drawing_id: &str,
        view_changed: bool,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        if cancel.is_cancelled() {
            self.metrics.refreshes_cancelled.inc();
            return Err(DrawingSearchError::CancelledRefresh(drawing_id.to_string()));
        }

        match self
            .cache
            .refresh_and_ingest(self.host.as_ref(), drawing_id, view_changed, Some(cancel))
        {
            Ok(report) => {
                self.record(drawing_id, &report);
                Ok(report)
            }
            Err(e) => {
                if e.is_retryable() {
                    self.metrics.refreshes_cancelled.inc();
                }
                Err(e)
            }
        }
    }

    /// Cancels any refresh still in flight, then refreshes `drawing_id`,
    /// retrying when a newer load cancels this one.
    pub fn on_drawing_loaded(&self, drawing_id: &str) -> Result<IngestReport> {
        let mut last_error = None;
        for attempt in 0..=self.refresh_retries {
            let token = self.start_refresh();
            match self.refresh_cache(drawing_id, false, &token) {
                Ok(report) => {
                    self.finish_refresh(&token);
                    return Ok(report);
                }
                Err(e) if e.is_retryable() => {
                    debug!("Refresh of drawing {drawing_id} cancelled (attempt {})", attempt + 1);
                    last_error = Some(e);
                }
                Err(e) => {
                    self.finish_refresh(&token);
                    return Err(e);
                }
            }
        }
        *self.in_flight.lock() = None;
        warn!(
            "Giving up refreshing drawing {drawing_id} after {} attempt(s)",
            self.refresh_retries + 1
        );
        Err(last_error.unwrap_or_else(|| DrawingSearchError::CancelledRefresh(drawing_id.to_string())))
    }

    /// Refreshes only when the drawing's object count moved or its views
    /// changed. Returns `None` when nothing needed doing.
    pub fn on_drawing_changed(
        &self,
        drawing_id: &str,
        view_changed: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<IngestReport>> {
        let count = self.host.enumerate_objects(drawing_id)?.len();
        let known = self.history.lock().last_count(drawing_id);
        if !view_changed && known == Some(count) {
            debug!("Drawing {drawing_id} unchanged ({count} objects)");
            return Ok(None);
        }
        self.invalidate_drawing(drawing_id);
        self.refresh_cache(drawing_id, view_changed, cancel).map(Some)
    }

    /// Marks the cache dirty. Returns false unless it was ready.
    pub fn invalidate_drawing(&self, drawing_id: &str) -> bool {
        let dirty = self.cache.state().mark_dirty();
        if dirty {
            debug!("Cache marked dirty by drawing {drawing_id}");
        }
        dirty
    }

    pub fn remove_drawing(&self, drawing_id: &str) -> bool {
        self.history.lock().forget(drawing_id);
        self.cache.remove_main_key(&self.keys.drawing_key(drawing_id))
    }

    pub fn has_drawing_been_cached(&self, drawing_id: &str) -> bool {
        self.cache.contains_main_key(&self.keys.drawing_key(drawing_id))
    }

    pub fn drawing_identifiers(&self) -> Vec<String> {
        self.cache
            .main_keys()
            .into_iter()
            .map(|key| key.id().to_string())
            .collect()
    }

    pub fn drawing_entries(&self, drawing_id: &str) -> Vec<(CacheKey, SharedObject)> {
        self.cache.snapshot(&self.keys.drawing_key(drawing_id))
    }

    pub fn get_drawing_object(&self, drawing_id: &str, object_id: &str) -> Option<SharedObject> {
        self.cache.get(
            &self.keys.drawing_key(drawing_id),
            &self.keys.drawing_object_key(drawing_id, object_id),
        )
    }

    pub fn assembly_positions(&self, drawing_id: &str) -> Vec<String> {
        self.cache
            .dump_positions_for(&self.keys.drawing_key(drawing_id))
    }

    /// Assembly keys of `drawing_id` carrying `position`; main-part keys only
    /// unless `include_all`.
    pub fn assembly_objects(&self, drawing_id: &str, position: &str, include_all: bool) -> Vec<CacheKey> {
        let main_key = self.keys.drawing_key(drawing_id);
        let mut keys: Vec<CacheKey> = self
            .cache
            .fetch_by_position(position)
            .into_iter()
            .filter(|key| key.belongs_to(&main_key))
            .filter(|key| include_all || key.is_main())
            .collect();
        keys.sort();
        keys
    }

    pub fn related_objects(&self, drawing_id: &str, key: &CacheKey) -> Vec<SharedObject> {
        self.cache.related_to(&self.keys.drawing_key(drawing_id), key)
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_caching()
    }

    pub fn state(&self) -> CacheState {
        self.cache.cache_state()
    }

    pub fn subscribe_caching(&self, observer: Arc<dyn Observer<bool>>) {
        self.cache.state().subscribe(observer);
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn record(&self, drawing_id: &str, report: &IngestReport) {
        self.history.lock().record(drawing_id, report.objects);
        self.metrics.objects_cached.inc_by(report.objects as u64);
        self.metrics
            .assembly_links_skipped
            .inc_by(report.links_skipped as u64);
        info!("Drawing {drawing_id} cached ({} objects)", report.objects);
    }

    fn start_refresh(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.in_flight.lock().replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Clears the in-flight slot unless a newer refresh has taken it, which
    /// would have cancelled `token`.
    fn finish_refresh(&self, token: &CancellationToken) {
        let mut in_flight = self.in_flight.lock();
        if !token.is_cancelled() {
            *in_flight = None;
        }
    }
}
