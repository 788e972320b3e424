//! Request body for the remote scoring service

use crate::distance::{DistanceType, EmbeddingDims};
use crate::filters::FilterBounds;
use crate::search::{ResolvedSearchRequest, SearchTarget};
use serde::{Deserialize, Serialize};

/// JSON body of `POST /similar`.
///
/// Exactly one of `game_id`/`game_ids` is set. Filter fields are flattened
/// into the top level and omitted when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_ids: Option<Vec<i64>>,

    pub top_k: usize,

    pub distance_type: DistanceType,

    pub embedding_dims: EmbeddingDims,

    #[serde(flatten)]
    pub filters: FilterBounds,
}

impl SimilarRequest {
    pub fn for_game(
        game_id: i64,
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        dims: EmbeddingDims,
    ) -> Self {
        Self {
            game_id: Some(game_id),
            game_ids: None,
            top_k,
            distance_type: distance,
            embedding_dims: dims,
            filters: *filters,
        }
    }

    pub fn for_games(
        game_ids: &[i64],
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        dims: EmbeddingDims,
    ) -> Self {
        Self {
            game_id: None,
            game_ids: Some(game_ids.to_vec()),
            top_k,
            distance_type: distance,
            embedding_dims: dims,
            filters: *filters,
        }
    }

    pub fn from_resolved(request: &ResolvedSearchRequest) -> Self {
        match &request.target {
            SearchTarget::Game(id) => {
                Self::for_game(*id, request.top_k, request.distance, &request.filters, request.dims)
            }
            SearchTarget::Games(ids) => {
                Self::for_games(ids, request.top_k, request.distance, &request.filters, request.dims)
            }
        }
    }
}
