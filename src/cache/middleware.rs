//! Page cache middleware for the index route.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::{debug, instrument, warn};

use super::{CacheConfig, IndexKey, PageCache, store::CacheEntry};

/// Shared cache state for the middleware and the admin clear endpoint.
#[derive(Clone)]
pub struct IndexCacheState {
    pub config: CacheConfig,
    pub cache: Arc<PageCache>,
}

impl IndexCacheState {
    pub fn new(config: CacheConfig) -> Self {
        let cache = Arc::new(PageCache::new(config.index_ttl));
        Self { config, cache }
    }
}

/// Serve the index from the slot when possible, otherwise render and store it.
///
/// Only GET requests answered with 200 are stored.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn index_cache_layer(
    State(state): State<IndexCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = IndexKey::from_request(&request);
    if let Some(entry) = state.cache.get(&key) {
        debug!(cache = "index", outcome = "hit", "serving cached index");
        return build_response(entry);
    }

    debug!(cache = "index", outcome = "miss", "rendering index");
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match BodyExt::collect(body).await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to buffer index body for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect();
    state
        .cache
        .put(key, parts.status.as_u16(), headers, bytes.clone());

    Response::from_parts(parts, Body::from(bytes))
}

fn build_response(entry: CacheEntry) -> Response {
    let mut builder = Response::builder().status(entry.status);
    for (name, value) in entry.headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(Body::from(entry.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
