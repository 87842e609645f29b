//! Cache key for the index slot.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use axum::http::{Request, header};

/// Identifies which rendering of the index the slot holds.
///
/// The index varies by page number (query string) and by viewer (cookies), so
/// both are part of the key. A request whose key differs from the stored one is
/// a miss and replaces the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub query_hash: u64,
    pub viewer_hash: u64,
}

impl IndexKey {
    pub fn new(query: &str, cookie: &str) -> Self {
        Self {
            query_hash: hash_value(&query),
            viewer_hash: hash_value(&cookie),
        }
    }

    pub fn from_request<B>(request: &Request<B>) -> Self {
        let query = request.uri().query().unwrap_or("");
        let cookie = request
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");
        Self::new(query, &cookie)
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
