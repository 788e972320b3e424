//! Direct warehouse backend
//!
//! Composes SQL and runs it through a [`Warehouse`]. Every ranking failure on
//! this path degrades to "no results": warehouse errors, undecodable rows and
//! a source game without an embedding all come back as an empty list. The
//! complexity lookup reports failures so they are never mistaken for a game
//! without complexity.

use super::models::{BackendHealth, BackendKind, Candidate};
use super::ranking::rank_candidates;
use super::SimilarityBackend;
use crate::compose::sql::{self, GAME_IDS_PARAM, GAME_ID_PARAM, TOP_K_PARAM};
use crate::distance::{DistanceType, EmbeddingDims};
use crate::error::{Result, WarehouseError};
use crate::filters::FilterBounds;
use crate::warehouse::{QueryParameter, Row, TableRef, Warehouse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Similarity client that queries the warehouse directly
pub struct DirectSimilarityClient {
    table: TableRef,
    warehouse: Arc<dyn Warehouse>,
}

impl DirectSimilarityClient {
    pub fn new(table: TableRef, warehouse: Arc<dyn Warehouse>) -> Self {
        info!("DirectSimilarityClient initialized with table={}", table);
        Self { table, warehouse }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Run a ranking query, turning any failure into an empty result
    async fn run_ranking(
        &self,
        sql: &str,
        params: &[QueryParameter],
        excluded: &[i64],
        distance: DistanceType,
        top_k: usize,
    ) -> Vec<Candidate> {
        let rows = match self.warehouse.query(sql, params).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Similarity query failed, returning no results: {}", e);
                return Vec::new();
            }
        };

        let candidates: std::result::Result<Vec<Candidate>, WarehouseError> =
            rows.iter().map(candidate_from_row).collect();

        match candidates {
            Ok(candidates) => {
                if candidates.is_empty() {
                    debug!("No candidates returned; source embedding may be missing");
                }
                rank_candidates(candidates, excluded, distance, top_k)
            }
            Err(e) => {
                error!("Failed to decode similarity rows, returning no results: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SimilarityBackend for DirectSimilarityClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    async fn find_similar_games(
        &self,
        game_id: i64,
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        dims: EmbeddingDims,
    ) -> Result<Vec<Candidate>> {
        info!(
            "Finding similar games for game_id={}, top_k={}, dims={}",
            game_id,
            top_k,
            dims.as_u32()
        );

        let query = sql::similar_games_sql(&self.table, dims, distance, filters);
        let params = [
            QueryParameter::int64(GAME_ID_PARAM, game_id),
            QueryParameter::int64(TOP_K_PARAM, top_k as i64),
        ];

        Ok(self
            .run_ranking(&query, &params, &[game_id], distance, top_k)
            .await)
    }

    async fn find_games_like(
        &self,
        game_ids: &[i64],
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        dims: EmbeddingDims,
    ) -> Result<Vec<Candidate>> {
        info!(
            "Finding games like game_ids={:?}, top_k={}, dims={}",
            game_ids,
            top_k,
            dims.as_u32()
        );

        let query = sql::games_like_sql(&self.table, dims, distance, filters);
        let params = [
            QueryParameter::int64_array(GAME_IDS_PARAM, game_ids),
            QueryParameter::int64(TOP_K_PARAM, top_k as i64),
        ];

        Ok(self
            .run_ranking(&query, &params, game_ids, distance, top_k)
            .await)
    }

    async fn game_complexity(&self, game_id: i64) -> Result<Option<f64>> {
        let query = sql::complexity_sql(&self.table);
        let params = [QueryParameter::int64(GAME_ID_PARAM, game_id)];

        // A failed lookup is an error, not "no complexity on record"
        let rows = self.warehouse.query(&query, &params).await.map_err(|e| {
            error!("Complexity lookup failed for game_id={}: {}", game_id, e);
            e
        })?;

        match rows.first() {
            Some(row) => Ok(row.get_f64("complexity")?.filter(|v| v.is_finite())),
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        let start = Instant::now();
        let result = self.warehouse.query("SELECT 1 AS ok", &[]).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        Ok(match result {
            Ok(_) => BackendHealth {
                backend: BackendKind::Direct,
                healthy: true,
                message: Some(format!("Warehouse reachable (table: {})", self.table)),
                response_time_ms,
            },
            Err(e) => BackendHealth {
                backend: BackendKind::Direct,
                healthy: false,
                message: Some(e.to_string()),
                response_time_ms,
            },
        })
    }
}

/// Decode one ranking row into a candidate
pub fn candidate_from_row(row: &Row) -> std::result::Result<Candidate, WarehouseError> {
    let game_id = row
        .get_i64("game_id")?
        .ok_or_else(|| WarehouseError::Decode("missing game_id".to_string()))?;

    Ok(Candidate {
        game_id,
        name: row.get_string("name")?.unwrap_or_default(),
        year_published: row
            .get_i64("year_published")?
            .and_then(|y| i32::try_from(y).ok()),
        users_rated: row.get_i64("users_rated")?,
        average_rating: row.get_f64("average_rating")?,
        geek_rating: row.get_f64("geek_rating")?,
        complexity: row.get_f64("complexity")?,
        thumbnail: row.get_string("thumbnail")?,
        distance: row.get_f64("distance")?.unwrap_or(f64::NAN),
    })
}
