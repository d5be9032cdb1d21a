//! Shared response cache.
//!
//! Cached bodies live in a `moka` cache keyed by `prefix:generation:path?query|vary`.
//! Invalidating a prefix bumps its generation, so every key built afterwards
//! misses and the stale entries simply age out through the TTL.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use actix_web::{http::header::ContentType, HttpRequest, HttpResponse};
use moka::future::Cache;

use crate::configuration::CacheSettings;

pub const CACHE_STATUS_HEADER: &str = "X-Cache";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePrefix{
    ProductList,
    ProductInfo,
    Orders
}

impl CachePrefix {
    const ALL: [CachePrefix; 3] = [CachePrefix::ProductList, CachePrefix::ProductInfo, CachePrefix::Orders];

    fn name(&self) -> &'static str {
        match self {
            CachePrefix::ProductList => "product_list",
            CachePrefix::ProductInfo => "product_info",
            CachePrefix::Orders => "orders"
        }
    }

    fn index(&self) -> usize {
        match self {
            CachePrefix::ProductList => 0,
            CachePrefix::ProductInfo => 1,
            CachePrefix::Orders => 2
        }
    }
}

#[derive(Clone)]
pub struct ResponseCache{
    entries: Cache<String, Arc<String>>,
    generations: Arc<[AtomicU64; 3]>
}

impl ResponseCache {
    pub fn new(settings: &CacheSettings) -> Self{
        let entries = Cache::builder()
            .max_capacity(settings.max_capacity)
            .time_to_live(Duration::from_secs(settings.ttl_seconds))
            .build();

        Self{
            entries,
            generations: Arc::new([AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)])
        }
    }

    /// Key for the request's absolute URI; `vary` separates callers who must
    /// not share an entry (e.g. per-user order lists).
    ///
    /// Cached pages embed absolute links built from the scheme and host the
    /// client sent, so those are part of the key as well.
    pub fn key(&self, prefix: CachePrefix, req: &HttpRequest, vary: Option<&str>) -> String{
        let generation = self.generations[prefix.index()].load(Ordering::Acquire);
        let connection = req.connection_info();
        format!(
            "{}:{}:{}://{}{}?{}|{}",
            prefix.name(),
            generation,
            connection.scheme(),
            connection.host(),
            req.path(),
            req.query_string(),
            vary.unwrap_or("")
        )
    }

    pub async fn get(&self, key: &str) -> Option<Arc<String>>{
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: String, body: String){
        self.entries.insert(key, Arc::new(body)).await;
    }

    #[tracing::instrument("Invalidating cached responses", skip(self))]
    pub fn invalidate(&self, prefix: CachePrefix){
        self.generations[prefix.index()].fetch_add(1, Ordering::AcqRel);
    }

    pub fn invalidate_all(&self){
        for prefix in CachePrefix::ALL {
            self.invalidate(prefix);
        }
    }
}

/// JSON response for a cached (or freshly cached) body.
pub fn cached_json(body: &str, hit: bool) -> HttpResponse{
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .insert_header((CACHE_STATUS_HEADER, if hit { "HIT" } else { "MISS" }))
        .body(body.to_string())
}
