pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod metrics;
pub mod model;
pub mod search;

pub use crate::cache::{CacheKey, CacheKeyBuilder, CacheKeyGenerator, CacheService, ObjectCache};
pub use crate::error::{DrawingSearchError, Result};
pub use crate::host::{CadHost, HostResultSelector, ResultSelector, SnapshotHost};
pub use crate::model::{DrawingObject, SharedObject};
pub use crate::search::executors::{
    AssemblySearchExecutor, ExecutorContext, ModelObjectSearchExecutor, PartMarkSearchExecutor,
    SearchExecutor, TextSearchExecutor,
};
pub use crate::search::service::DrawingSearchService;
pub use crate::search::{
    MatchStrategy, SearchBuilder, SearchConfiguration, SearchDomain, SearchEngine, SearchOutcome,
    SearchQuery, SearchResult,
};
pub use clap::Parser;
