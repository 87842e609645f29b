//! Single-slot storage for the rendered index page.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use metrics::counter;
use tracing::{debug, warn};

use super::keys::IndexKey;
use super::{CACHE_CLEAR_METRIC, CACHE_HIT_METRIC, CACHE_MISS_METRIC};

const SOURCE: &str = "cache::store";

/// A memoised response together with the key and time it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: IndexKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

pub struct PageCache {
    ttl: Duration,
    slot: RwLock<Option<CacheEntry>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn get(&self, key: &IndexKey) -> Option<CacheEntry> {
        self.get_at(key, Instant::now())
    }

    /// Return the stored entry when it matches `key` and is younger than the TTL.
    /// An expired entry is evicted on the way out.
    pub fn get_at(&self, key: &IndexKey, now: Instant) -> Option<CacheEntry> {
        let expired = {
            let slot = read_slot(&self.slot, "get");
            match slot.as_ref() {
                Some(entry) if entry.is_fresh(now, self.ttl) => {
                    if entry.key == *key {
                        counter!(CACHE_HIT_METRIC).increment(1);
                        return Some(entry.clone());
                    }
                    false
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut slot = write_slot(&self.slot, "get.evict");
            if slot
                .as_ref()
                .is_some_and(|entry| !entry.is_fresh(now, self.ttl))
            {
                *slot = None;
                debug!(target = SOURCE, "expired index entry evicted");
            }
        }

        counter!(CACHE_MISS_METRIC).increment(1);
        None
    }

    pub fn put(&self, key: IndexKey, status: u16, headers: Vec<(String, String)>, body: Bytes) {
        self.put_at(key, status, headers, body, Instant::now());
    }

    /// Last write wins on the single slot.
    pub fn put_at(
        &self,
        key: IndexKey,
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
        stored_at: Instant,
    ) {
        *write_slot(&self.slot, "put") = Some(CacheEntry {
            key,
            status,
            headers,
            body,
            stored_at,
        });
    }

    pub fn clear(&self) {
        *write_slot(&self.slot, "clear") = None;
        counter!(CACHE_CLEAR_METRIC).increment(1);
        debug!(target = SOURCE, "index cache cleared");
    }

    pub fn is_empty(&self) -> bool {
        read_slot(&self.slot, "is_empty").is_none()
    }
}

fn read_slot<'a>(
    lock: &'a RwLock<Option<CacheEntry>>,
    op: &'static str,
) -> RwLockReadGuard<'a, Option<CacheEntry>> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = SOURCE,
            lock_kind = "rwlock.read",
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}

fn write_slot<'a>(
    lock: &'a RwLock<Option<CacheEntry>>,
    op: &'static str,
) -> RwLockWriteGuard<'a, Option<CacheEntry>> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            op,
            target_module = SOURCE,
            lock_kind = "rwlock.write",
            result = "poisoned_recovered",
            "Recovered from poisoned cache lock"
        );
        poisoned.into_inner()
    })
}
