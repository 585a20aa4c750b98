use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub objects_cached: IntCounter,
    pub assembly_links_skipped: IntCounter,
    pub searches_executed: IntCounter,
    pub searches_rejected: IntCounter,
    pub matches_found: IntCounter,
    pub refreshes_cancelled: IntCounter,
    registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::with_opts(Opts::new(name, help)).expect("static counter options are valid");
    registry.register(Box::new(counter.clone())).ok();
    counter
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        Metrics {
            objects_cached: counter(&registry, "objects_cached", "Number of drawing objects cached"),
            assembly_links_skipped: counter(
                &registry,
                "assembly_links_skipped",
                "Number of parts whose owning assembly could not be resolved",
            ),
            searches_executed: counter(&registry, "searches_executed", "Number of searches executed"),
            searches_rejected: counter(
                &registry,
                "searches_rejected",
                "Number of searches rejected while caching",
            ),
            matches_found: counter(&registry, "matches_found", "Number of matches found"),
            refreshes_cancelled: counter(
                &registry,
                "refreshes_cancelled",
                "Number of cache refreshes aborted by cancellation",
            ),
            registry: Arc::new(registry),
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
