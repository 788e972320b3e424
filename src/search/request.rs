//! Search requests, before and after relative-filter resolution

use crate::distance::{DistanceType, EmbeddingDims};
use crate::filters::{FilterBounds, SimilarityFilters};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Find games similar to one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityQuery {
    pub game_id: i64,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub distance: DistanceType,

    /// Requested resolution; unset or unsupported means 64
    #[serde(default)]
    pub embedding_dims: Option<u32>,

    #[serde(default)]
    pub filters: SimilarityFilters,
}

/// Find games similar to the centroid of several games
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSimilarityQuery {
    pub game_ids: Vec<i64>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub distance: DistanceType,

    #[serde(default)]
    pub embedding_dims: Option<u32>,

    #[serde(default)]
    pub filters: SimilarityFilters,
}

impl SimilarityQuery {
    pub fn new(game_id: i64) -> Self {
        Self {
            game_id,
            top_k: default_top_k(),
            distance: DistanceType::default(),
            embedding_dims: None,
            filters: SimilarityFilters::default(),
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn distance(mut self, distance: DistanceType) -> Self {
        self.distance = distance;
        self
    }

    pub fn embedding_dims(mut self, dims: u32) -> Self {
        self.embedding_dims = Some(dims);
        self
    }

    pub fn filters(mut self, filters: SimilarityFilters) -> Self {
        self.filters = filters;
        self
    }
}

impl MultiSimilarityQuery {
    pub fn new(game_ids: Vec<i64>) -> Self {
        Self {
            game_ids,
            top_k: default_top_k(),
            distance: DistanceType::default(),
            embedding_dims: None,
            filters: SimilarityFilters::default(),
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn distance(mut self, distance: DistanceType) -> Self {
        self.distance = distance;
        self
    }

    pub fn embedding_dims(mut self, dims: u32) -> Self {
        self.embedding_dims = Some(dims);
        self
    }

    pub fn filters(mut self, filters: SimilarityFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// What the ranking is anchored on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTarget {
    Game(i64),
    /// Sorted, de-duplicated source ids
    Games(Vec<i64>),
}

impl SearchTarget {
    pub fn games(ids: &[i64]) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        SearchTarget::Games(ids)
    }

    /// Ids that must never appear in their own result set
    pub fn excluded_ids(&self) -> &[i64] {
        match self {
            SearchTarget::Game(id) => std::slice::from_ref(id),
            SearchTarget::Games(ids) => ids,
        }
    }
}

/// A fully materialized search: only absolute bounds remain.
///
/// Lives for one search call and doubles as the result cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSearchRequest {
    pub target: SearchTarget,
    pub top_k: usize,
    pub distance: DistanceType,
    pub dims: EmbeddingDims,
    pub filters: FilterBounds,
}

impl ResolvedSearchRequest {
    /// Stable key over every resolved parameter
    pub fn cache_key(&self) -> String {
        let encoded = serde_json::to_vec(self).unwrap_or_else(|_| format!("{:?}", self).into_bytes());

        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        format!("sim_{}", hex::encode(hasher.finalize()))
    }
}

fn default_top_k() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filters: FilterBounds) -> ResolvedSearchRequest {
        ResolvedSearchRequest {
            target: SearchTarget::Game(42),
            top_k: 5,
            distance: DistanceType::Cosine,
            dims: EmbeddingDims::D64,
            filters,
        }
    }

    #[test]
    fn test_cache_key_is_stable() {
        let bounds = FilterBounds {
            min_complexity: Some(2.3),
            max_complexity: Some(3.3),
            ..FilterBounds::default()
        };
        assert_eq!(request(bounds).cache_key(), request(bounds).cache_key());
        assert!(request(bounds).cache_key().starts_with("sim_"));
    }

    #[test]
    fn test_cache_key_covers_every_field() {
        let base = request(FilterBounds::default());
        let mut other = base.clone();
        other.filters.max_users_rated = Some(5000);
        assert_ne!(base.cache_key(), other.cache_key());

        let mut other = base.clone();
        other.dims = EmbeddingDims::D8;
        assert_ne!(base.cache_key(), other.cache_key());

        let mut other = base.clone();
        other.target = SearchTarget::games(&[42]);
        assert_ne!(base.cache_key(), other.cache_key());
    }

    #[test]
    fn test_games_target_is_normalized() {
        assert_eq!(SearchTarget::games(&[3, 1, 3, 2]), SearchTarget::Games(vec![1, 2, 3]));
        assert_eq!(SearchTarget::Game(7).excluded_ids(), &[7]);
    }
}
