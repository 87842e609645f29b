//! Cache configuration.

use std::time::Duration;

use crate::config::DEFAULT_INDEX_TTL_SECS;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve the index through the page cache.
    pub enabled: bool,
    /// Lifetime of a memoised index page.
    pub index_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl: Duration::from_secs(DEFAULT_INDEX_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_ttl: settings.index_ttl,
        }
    }
}
