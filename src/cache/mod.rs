//! Caching module
//!
//! Short-lived caches of source results keyed by the committed query.

use crate::query::SearchQuery;
use crate::results::SourceKind;
use moka::future::Cache;
use std::time::Duration;

/// TTL cache of one source's results
pub struct ResultCache<V: Clone + Send + Sync + 'static> {
    cache: Cache<String, V>,
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    /// Create a new result cache with specified TTL
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { cache }
    }

    /// Get a cached result
    pub async fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key).await
    }

    /// Store a result in cache
    pub async fn set(&self, key: String, value: V) {
        self.cache.insert(key, value).await;
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of entries
    pub fn size(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl<V: Clone + Send + Sync + 'static> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(60, 1000)
    }
}

/// Generate a cache key for a query against one source
///
/// Lexical keys cover text, filters and page. Semantic matching ignores
/// filters and pagination, so only the text and the match parameters count.
pub fn query_cache_key(source: SourceKind, query: &SearchQuery, extra: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(query.text.as_bytes());
    hasher.update([0]);
    if source == SourceKind::Lexical {
        if let Some(folder) = &query.filters.folder_id {
            hasher.update(folder.as_bytes());
        }
        hasher.update([0]);
        for tag in query.filters.tag_filter().unwrap_or_default() {
            hasher.update(tag.as_bytes());
            hasher.update([0]);
        }
        hasher.update(query.page.to_string().as_bytes());
    }
    hasher.update(extra.as_bytes());

    format!("{:x}", hasher.finalize())
}
