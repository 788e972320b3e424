//! Result cache for resolved similarity searches, backed by moka
//!
//! Ranking results are keyed by [`ResolvedSearchRequest::cache_key`], so two
//! relative requests that resolve to the same absolute bounds share an entry.
//! Query-game complexities are cached alongside so that a repeated search
//! also skips the resolution lookup. Expiry is time based only.
//!
//! [`ResolvedSearchRequest::cache_key`]: crate::search::ResolvedSearchRequest::cache_key

use crate::backend::Candidate;
use crate::config::CacheConfig;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Statistics about cache contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub results: u64,
    pub complexities: u64,
}

/// Shared, concurrent cache of ranked results.
///
/// Racing writes for one key are last-write-wins; equal keys always carry
/// equivalent results.
pub struct ResultCache {
    results: Cache<String, Arc<Vec<Candidate>>>,
    complexities: Cache<i64, Option<f64>>,
    ttl: Duration,
}

impl ResultCache {
    /// Create a new cache with specified capacity and TTL
    pub fn new(max_size: u64, ttl: Duration) -> Self {
        info!("Initializing result cache with max_size={}, ttl={:?}", max_size, ttl);

        let results = Cache::builder()
            .max_capacity(max_size)
            .time_to_live(ttl)
            .build();

        let complexities = Cache::builder()
            .max_capacity(max_size)
            .time_to_live(ttl)
            .build();

        Self {
            results,
            complexities,
            ttl,
        }
    }

    /// Build from configuration; `None` when caching is disabled
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            info!("Result cache disabled");
            return None;
        }
        Some(Self::new(config.max_size, Duration::from_secs(config.ttl_secs)))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get cached results for a resolved request key
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<Candidate>>> {
        let result = self.results.get(key).await;

        if result.is_some() {
            debug!("Cache hit for key: {}", key);
        } else {
            debug!("Cache miss for key: {}", key);
        }

        result
    }

    /// Store results; empty result sets are not cached
    pub async fn insert(&self, key: String, results: Arc<Vec<Candidate>>) {
        if results.is_empty() {
            debug!("Not caching empty result for key: {}", key);
            return;
        }
        debug!("Cached {} results for key: {}", results.len(), key);
        self.results.insert(key, results).await;
    }

    /// Cached complexity lookup; the outer `None` is a miss
    pub async fn get_complexity(&self, game_id: i64) -> Option<Option<f64>> {
        self.complexities.get(&game_id).await
    }

    pub async fn insert_complexity(&self, game_id: i64, complexity: Option<f64>) {
        self.complexities.insert(game_id, complexity).await;
    }

    /// Clear all entries
    pub async fn clear(&self) {
        self.results.invalidate_all();
        self.complexities.invalidate_all();
        self.results.run_pending_tasks().await;
        self.complexities.run_pending_tasks().await;
        info!("Result cache cleared");
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.results.run_pending_tasks().await;
        self.complexities.run_pending_tasks().await;

        CacheStats {
            results: self.results.entry_count(),
            complexities: self.complexities.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(game_id: i64, distance: f64) -> Candidate {
        Candidate {
            game_id,
            name: format!("Game {}", game_id),
            year_published: None,
            users_rated: None,
            average_rating: None,
            geek_rating: None,
            complexity: None,
            thumbnail: None,
            distance,
        }
    }

    #[tokio::test]
    async fn test_cache_insert_get() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        let results = Arc::new(vec![candidate(1, 0.1)]);

        cache.insert("key".to_string(), results.clone()).await;
        assert_eq!(cache.get("key").await, Some(results));
        assert_eq!(cache.get("other").await, None);
    }

    #[tokio::test]
    async fn test_empty_results_not_cached() {
        let cache = ResultCache::new(10, Duration::from_secs(60));

        cache.insert("key".to_string(), Arc::new(Vec::new())).await;
        assert_eq!(cache.get("key").await, None);
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        let cache = ResultCache::new(10, Duration::from_millis(100));

        cache
            .insert("key".to_string(), Arc::new(vec![candidate(1, 0.1)]))
            .await;
        cache.insert_complexity(42, Some(2.8)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.get("key").await, None);
        assert_eq!(cache.get_complexity(42).await, None);
    }

    #[tokio::test]
    async fn test_complexity_side_cache_keeps_misses() {
        let cache = ResultCache::new(10, Duration::from_secs(60));

        cache.insert_complexity(42, Some(2.8)).await;
        cache.insert_complexity(7, None).await;

        assert_eq!(cache.get_complexity(42).await, Some(Some(2.8)));
        assert_eq!(cache.get_complexity(7).await, Some(None));
        assert_eq!(cache.get_complexity(8).await, None);
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        cache
            .insert("a".to_string(), Arc::new(vec![candidate(1, 0.1)]))
            .await;
        cache.insert_complexity(1, Some(3.0)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.results, 1);
        assert_eq!(stats.complexities, 1);

        cache.clear().await;
        assert_eq!(
            cache.stats().await,
            CacheStats {
                results: 0,
                complexities: 0
            }
        );
        assert_eq!(cache.get("a").await, None);
    }

    #[test]
    fn test_disabled_config() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        assert!(ResultCache::from_config(&config).is_none());
        assert!(ResultCache::from_config(&CacheConfig::default()).is_some());
    }
}
