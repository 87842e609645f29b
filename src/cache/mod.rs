//! Index page cache.
//!
//! The rendered front page is memoised in a single slot for a bounded time.
//! Only expiry and an explicit [`PageCache::clear`] evict it; writing posts,
//! comments or follows never does, so the index may lag behind the data for up
//! to one TTL.
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_ttl_seconds = 20
//! ```

mod config;
mod keys;
mod middleware;
mod store;

pub use config::CacheConfig;
pub use keys::{IndexKey, hash_value};
pub use middleware::{IndexCacheState, index_cache_layer};
pub use store::{CacheEntry, PageCache};

pub const CACHE_HIT_METRIC: &str = "yatube_index_cache_hit_total";
pub const CACHE_MISS_METRIC: &str = "yatube_index_cache_miss_total";
pub const CACHE_CLEAR_METRIC: &str = "yatube_index_cache_clear_total";
