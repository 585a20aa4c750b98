//! Per-domain search orchestration over the cache
use crate::cache::{CacheKey, CacheService};
use crate::error::Result;
use crate::host::ResultSelector;
use crate::model::{ObjectId, ObjectKind, SharedObject};
use crate::search::engine::{SearchEngine, DEFAULT_CHUNK_SIZE};
use crate::search::extractors::{DataExtractor, Extractor};
use crate::search::observer::ContentCollectingObserver;
use crate::search::strategies::RegexCache;
use crate::search::{SearchConfiguration, SearchDomain, SearchResult};
use log::debug;
use rayon::ThreadPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Runs one search domain against one cached drawing and hands the matches
/// to the result selector. `elapsed` is left for the caller to stamp.
pub trait SearchExecutor: Send + Sync {
    fn domain(&self) -> SearchDomain;

    fn execute(&self, config: &SearchConfiguration, drawing_id: &str) -> Result<SearchResult>;
}

/// Collaborators shared by every executor.
#[derive(Clone)]
pub struct ExecutorContext {
    cache: Arc<CacheService>,
    selector: Arc<dyn ResultSelector>,
    chunk_size: usize,
    pool: Option<Arc<ThreadPool>>,
    regex_cache: Arc<RegexCache>,
}

impl ExecutorContext {
    pub fn new(cache: Arc<CacheService>, selector: Arc<dyn ResultSelector>) -> Self {
        Self {
            cache,
            selector,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pool: None,
            regex_cache: Arc::new(RegexCache::default()),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_thread_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_regex_cache(mut self, regex_cache: Arc<RegexCache>) -> Self {
        self.regex_cache = regex_cache;
        self
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    fn engine<T>(&self, config: &SearchConfiguration, extractor: Extractor) -> SearchEngine<T>
    where
        T: Clone + Send + Sync,
        Extractor: DataExtractor<T>,
    {
        let engine = SearchEngine::new(config.strategies.clone(), extractor)
            .with_chunk_size(self.chunk_size)
            .with_regex_cache(self.regex_cache.clone());
        match &self.pool {
            Some(pool) => engine.with_thread_pool(pool.clone()),
            None => engine,
        }
    }

    /// Searches the cached objects of one kind and selects the matches.
    fn search_objects(
        &self,
        config: &SearchConfiguration,
        drawing_id: &str,
        kind: ObjectKind,
        extractor: Extractor,
    ) -> Result<usize> {
        let candidates: Vec<SharedObject> = self
            .cache
            .drawing_entries(drawing_id)
            .into_iter()
            .filter(|(_, object)| object.kind() == kind)
            .map(|(_, object)| object)
            .collect();

        let mut engine: SearchEngine<SharedObject> = self.engine(config, extractor);
        let collector = Arc::new(ContentCollectingObserver::new(extractor));
        engine.subscribe(collector.clone());
        let matches = engine.search(&candidates, &config.query())?;

        debug!(
            "{} of {} {kind} object(s) matched, {} distinct content value(s)",
            matches.len(),
            candidates.len(),
            collector.len()
        );
        self.selector.select_results(&matches)?;
        Ok(matches.len())
    }
}

pub struct PartMarkSearchExecutor {
    context: ExecutorContext,
}

impl PartMarkSearchExecutor {
    pub fn new(context: ExecutorContext) -> Self {
        Self { context }
    }
}

impl SearchExecutor for PartMarkSearchExecutor {
    fn domain(&self) -> SearchDomain {
        SearchDomain::PartMark
    }

    fn execute(&self, config: &SearchConfiguration, drawing_id: &str) -> Result<SearchResult> {
        let count = self
            .context
            .search_objects(config, drawing_id, ObjectKind::Mark, Extractor::Mark)?;
        Ok(SearchResult::new(count, self.domain()))
    }
}

pub struct TextSearchExecutor {
    context: ExecutorContext,
}

impl TextSearchExecutor {
    pub fn new(context: ExecutorContext) -> Self {
        Self { context }
    }
}

impl SearchExecutor for TextSearchExecutor {
    fn domain(&self) -> SearchDomain {
        SearchDomain::Text
    }

    fn execute(&self, config: &SearchConfiguration, drawing_id: &str) -> Result<SearchResult> {
        let count = self
            .context
            .search_objects(config, drawing_id, ObjectKind::Text, Extractor::Text)?;
        Ok(SearchResult::new(count, self.domain()))
    }
}

/// Searches assembly positions, then expands each matching position to the
/// drawing parts related to its assembly objects.
pub struct AssemblySearchExecutor {
    context: ExecutorContext,
}

impl AssemblySearchExecutor {
    pub fn new(context: ExecutorContext) -> Self {
        Self { context }
    }

    fn expand(&self, drawing_id: &str, positions: &[String], show_all: bool) -> Vec<SharedObject> {
        let cache = self.context.cache();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut parts = Vec::new();
        for position in positions {
            for key in cache.assembly_objects(drawing_id, position, show_all) {
                for object in cache.related_objects(drawing_id, &key) {
                    if object.kind() == ObjectKind::Part && seen.insert(object.id().clone()) {
                        parts.push(object);
                    }
                }
            }
        }
        parts
    }
}

impl SearchExecutor for AssemblySearchExecutor {
    fn domain(&self) -> SearchDomain {
        SearchDomain::Assembly
    }

    fn execute(&self, config: &SearchConfiguration, drawing_id: &str) -> Result<SearchResult> {
        let positions = self.context.cache().assembly_positions(drawing_id);
        let mut engine: SearchEngine<String> = self.context.engine(config, Extractor::AssemblyPosition);
        let collector = Arc::new(ContentCollectingObserver::new(Extractor::AssemblyPosition));
        engine.subscribe(collector.clone());
        engine.search(&positions, &config.query())?;

        let matched = collector.matched_content();
        let parts = self.expand(drawing_id, &matched, config.show_all_assembly_parts);
        debug!(
            "Assembly position(s) {:?} expanded to {} part(s)",
            matched,
            parts.len()
        );
        self.context.selector.select_results(&parts)?;
        Ok(SearchResult::new(parts.len(), self.domain()))
    }
}

/// Searches the report positions carried by the cached assembly model objects
/// and selects the drawing parts related to the matching ones.
pub struct ModelObjectSearchExecutor {
    context: ExecutorContext,
}

impl ModelObjectSearchExecutor {
    pub fn new(context: ExecutorContext) -> Self {
        Self { context }
    }
}

impl SearchExecutor for ModelObjectSearchExecutor {
    fn domain(&self) -> SearchDomain {
        SearchDomain::ModelObject
    }

    fn execute(&self, config: &SearchConfiguration, drawing_id: &str) -> Result<SearchResult> {
        let cache = self.context.cache();
        let mut keys_by_id: HashMap<ObjectId, Vec<CacheKey>> = HashMap::new();
        let mut candidates: Vec<SharedObject> = Vec::new();
        for (key, object) in cache.drawing_entries(drawing_id) {
            if object.kind() != ObjectKind::Model {
                continue;
            }
            if !config.show_all_assembly_parts && !key.is_main() {
                continue;
            }
            let keys = keys_by_id.entry(object.id().clone()).or_default();
            if keys.is_empty() {
                candidates.push(object);
            }
            keys.push(key);
        }

        let engine: SearchEngine<SharedObject> = self.context.engine(config, Extractor::ModelObject);
        let matches = engine.search(&candidates, &config.query())?;

        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut parts = Vec::new();
        for key in matches
            .iter()
            .filter_map(|model| keys_by_id.get(model.id()))
            .flatten()
        {
            for object in cache.related_objects(drawing_id, key) {
                if object.kind() == ObjectKind::Part && seen.insert(object.id().clone()) {
                    parts.push(object);
                }
            }
        }
        debug!(
            "{} of {} model object(s) matched, {} part(s) selected",
            matches.len(),
            candidates.len(),
            parts.len()
        );
        self.context.selector.select_results(&parts)?;
        Ok(SearchResult::new(parts.len(), self.domain()))
    }
}

/// One executor per domain, all sharing `context`.
pub fn default_executors(context: ExecutorContext) -> HashMap<SearchDomain, Arc<dyn SearchExecutor>> {
    let executors: [Arc<dyn SearchExecutor>; 4] = [
        Arc::new(PartMarkSearchExecutor::new(context.clone())),
        Arc::new(TextSearchExecutor::new(context.clone())),
        Arc::new(AssemblySearchExecutor::new(context.clone())),
        Arc::new(ModelObjectSearchExecutor::new(context)),
    ];
    executors
        .into_iter()
        .map(|executor| (executor.domain(), executor))
        .collect()
}
