//! Similarity backends: direct warehouse SQL and the remote scoring service

pub mod circuit_breaker;
pub mod direct;
pub mod factory;
pub mod models;
pub mod ranking;
pub mod service;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use direct::DirectSimilarityClient;
pub use factory::{build_backend, select_backend};
pub use models::{BackendHealth, BackendKind, Candidate};
pub use ranking::rank_candidates;
pub use service::ServiceSimilarityClient;

use crate::distance::{DistanceType, EmbeddingDims};
use crate::error::Result;
use crate::filters::FilterBounds;
use async_trait::async_trait;
use std::sync::Arc;

/// Ranking contract shared by every backend.
///
/// Results are sorted by the metric's direction, capped at `top_k`, and
/// never contain the query or source games. An empty `Ok` means "no similar
/// games"; an `Err` means the search could not be completed.
#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Games nearest to one game's embedding
    async fn find_similar_games(
        &self,
        game_id: i64,
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        dims: EmbeddingDims,
    ) -> Result<Vec<Candidate>>;

    /// Games nearest to the mean embedding of `game_ids`
    async fn find_games_like(
        &self,
        game_ids: &[i64],
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        dims: EmbeddingDims,
    ) -> Result<Vec<Candidate>>;

    /// Stored complexity of one game, read from the same source as ranking
    async fn game_complexity(&self, game_id: i64) -> Result<Option<f64>>;

    async fn health_check(&self) -> Result<BackendHealth>;

    /// Breaker guarding this backend's calls, if any
    fn circuit_breaker(&self) -> Option<Arc<CircuitBreaker>> {
        None
    }
}
