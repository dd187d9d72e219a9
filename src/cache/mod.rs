pub mod source_cache;

pub use source_cache::{CacheEntry, CacheKey, SourceCache, WARMUP_TIMEOUT};
