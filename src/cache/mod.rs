//! Drawing object cache and its service façade
pub mod history;
pub mod keys;
pub mod object_cache;
pub mod service;
pub mod state;

pub use keys::{CacheKey, CacheKeyBuilder, CacheKeyGenerator, KeyKind, RelationshipKey};
pub use object_cache::{CacheStats, IngestReport, ObjectCache};
pub use service::CacheService;
pub use state::{CacheState, CacheStateManager};
