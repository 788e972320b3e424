//! Similarity search facade
//!
//! [`SimilaritySearch`] owns the selected backend and the optional result
//! cache and runs the two-phase pipeline: resolve relative filters into a
//! [`ResolvedSearchRequest`], then rank through the cache and the backend.

pub mod request;

pub use request::{MultiSimilarityQuery, ResolvedSearchRequest, SearchTarget, SimilarityQuery};

use crate::backend::{build_backend, BackendKind, Candidate, SimilarityBackend};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::distance::EmbeddingDims;
use crate::error::{Result, SimilarityError};
use crate::resolver;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Entry point for similarity searches.
///
/// An `Ok` with an empty list means no similar games matched; an `Err` means
/// the search could not be completed.
///
/// # Example
///
/// ```rust,no_run
/// use game_similarity::prelude::*;
///
/// # async fn run() -> Result<()> {
/// let search = SimilaritySearch::from_config(&Config::from_env()?)?;
/// let results = search
///     .find_similar_games(&SimilarityQuery::new(174430).top_k(5))
///     .await?;
/// for game in results.iter() {
///     println!("{} ({:.3})", game.name, game.distance);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SimilaritySearch {
    backend: Arc<dyn SimilarityBackend>,
    cache: Option<Arc<ResultCache>>,
}

impl SimilaritySearch {
    pub fn new(backend: Arc<dyn SimilarityBackend>, cache: Option<Arc<ResultCache>>) -> Self {
        info!(
            "SimilaritySearch initialized with {} backend, cache={}",
            backend.kind(),
            cache.is_some()
        );
        Self { backend, cache }
    }

    /// Select the backend and build the cache from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = build_backend(config)?;
        let cache = ResultCache::from_config(&config.cache).map(Arc::new);
        Ok(Self::new(backend, cache))
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &Arc<dyn SimilarityBackend> {
        &self.backend
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Games most similar to one game
    pub async fn find_similar_games(&self, query: &SimilarityQuery) -> Result<Arc<Vec<Candidate>>> {
        validate_top_k(query.top_k)?;

        let resolved = resolver::resolve_cached(
            self.backend.as_ref(),
            self.cache.as_deref(),
            query.game_id,
            &query.filters,
        )
        .await;

        let filters = match resolved {
            Ok(filters) => filters,
            // The direct backend reports an unavailable warehouse as no results
            Err(e) if self.backend.kind() == BackendKind::Direct => {
                error!(
                    "Could not resolve filters for game_id={}, returning no results: {}",
                    query.game_id, e
                );
                return Ok(Arc::new(Vec::new()));
            }
            Err(e) => return Err(e),
        };

        let request = ResolvedSearchRequest {
            target: SearchTarget::Game(query.game_id),
            top_k: query.top_k,
            distance: query.distance,
            dims: EmbeddingDims::from_requested(query.embedding_dims),
            filters,
        };

        self.execute(&request).await
    }

    /// Games most similar to the centroid of several games
    pub async fn find_games_like(&self, query: &MultiSimilarityQuery) -> Result<Arc<Vec<Candidate>>> {
        validate_top_k(query.top_k)?;
        if query.game_ids.is_empty() {
            return Err(SimilarityError::InvalidRequest(
                "At least one source game is required".to_string(),
            ));
        }

        let request = ResolvedSearchRequest {
            target: SearchTarget::games(&query.game_ids),
            top_k: query.top_k,
            distance: query.distance,
            dims: EmbeddingDims::from_requested(query.embedding_dims),
            filters: resolver::resolve_for_many(&query.filters),
        };

        self.execute(&request).await
    }

    /// Run a resolved request through the cache and the backend
    pub async fn execute(&self, request: &ResolvedSearchRequest) -> Result<Arc<Vec<Candidate>>> {
        let key = request.cache_key();

        if let Some(cache) = &self.cache {
            if let Some(results) = cache.get(&key).await {
                return Ok(results);
            }
        }

        let start = Instant::now();
        let results = match &request.target {
            SearchTarget::Game(game_id) => {
                self.backend
                    .find_similar_games(
                        *game_id,
                        request.top_k,
                        request.distance,
                        &request.filters,
                        request.dims,
                    )
                    .await?
            }
            SearchTarget::Games(game_ids) => {
                self.backend
                    .find_games_like(
                        game_ids,
                        request.top_k,
                        request.distance,
                        &request.filters,
                        request.dims,
                    )
                    .await?
            }
        };
        debug!(
            "{} backend returned {} results in {:?}",
            self.backend.kind(),
            results.len(),
            start.elapsed()
        );

        let results = Arc::new(results);
        if let Some(cache) = &self.cache {
            cache.insert(key, results.clone()).await;
        }

        Ok(results)
    }

    /// Drop every cached result and complexity
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }
}

fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(SimilarityError::InvalidRequest(
            "top_k must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
