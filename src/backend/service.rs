//! HTTP client for the remote scoring service
//!
//! Unlike the direct backend, transport failures are surfaced to the caller
//! so that "service unreachable" stays distinguishable from "no similar
//! games".

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::models::{BackendHealth, BackendKind, Candidate};
use super::ranking::rank_candidates;
use super::SimilarityBackend;
use crate::compose::SimilarRequest;
use crate::distance::{DistanceType, EmbeddingDims};
use crate::error::{Result, ServiceError, SimilarityError};
use crate::filters::FilterBounds;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct SimilarResponse {
    #[serde(default)]
    results: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct GameResponse {
    #[serde(default)]
    complexity: Option<f64>,
}

/// Client for the embeddings scoring service
pub struct ServiceSimilarityClient {
    base_url: String,
    timeout: Duration,
    http_client: Client,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    /// Set once the service answers `/games/{id}` with 405 or 501
    complexity_unsupported: AtomicBool,
}

impl ServiceSimilarityClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(ServiceError::Http)?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!("ServiceSimilarityClient initialized with base_url={}", base_url);

        Ok(Self {
            base_url,
            timeout,
            http_client,
            circuit_breaker: None,
            complexity_unsupported: AtomicBool::new(false),
        })
    }

    /// Enable circuit breaker protection
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = Some(Arc::new(CircuitBreaker::new(config)));
        info!("Circuit breaker enabled for similarity service client");
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw payload of `GET /health`
    pub async fn service_health(&self) -> Result<Value> {
        let builder = self.http_client.get(self.url("/health"));
        self.send_json(builder).await
    }

    /// Embedding models the service can score with
    pub async fn list_models(&self) -> Result<Vec<Value>> {
        let builder = self.http_client.get(self.url("/models"));
        let response: ModelsResponse = self.send_json(builder).await?;
        Ok(response.models)
    }

    /// Statistics about the stored embeddings
    pub async fn embedding_stats(&self) -> Result<Value> {
        let builder = self.http_client.get(self.url("/embedding_stats"));
        self.send_json(builder).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_similar(&self, request: &SimilarRequest) -> Result<Vec<Candidate>> {
        let builder = self.http_client.post(self.url("/similar")).json(request);
        let response: SimilarResponse = self.send_json(builder).await?;

        debug!("Similarity service returned {} results", response.results.len());
        Ok(response.results)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()).into())
    }

    /// Send a request, mapping transport and status failures to [`ServiceError`]
    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        if let Some(cb) = &self.circuit_breaker {
            if !cb.allow_request().await {
                warn!("Circuit breaker is open, rejecting similarity service request");
                return Err(ServiceError::Unavailable("circuit breaker open".to_string()).into());
            }
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure().await;
                error!("Similarity service request failed: {}", e);
                if e.is_timeout() {
                    return Err(ServiceError::Timeout(self.timeout.as_secs()).into());
                }
                return Err(ServiceError::Http(e).into());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            self.record_failure().await;
        } else {
            self.record_success().await;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Similarity service error {}: {}", status, body);
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(response)
    }

    async fn record_failure(&self) {
        if let Some(cb) = &self.circuit_breaker {
            cb.record_failure().await;
        }
    }

    async fn record_success(&self) {
        if let Some(cb) = &self.circuit_breaker {
            cb.record_success().await;
        }
    }
}

#[async_trait]
impl SimilarityBackend for ServiceSimilarityClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Service
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

        let request = SimilarRequest::for_game(game_id, top_k, distance, filters, dims);
        let results = self.post_similar(&request).await?;
        Ok(rank_candidates(results, &[game_id], distance, top_k))
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

        let request = SimilarRequest::for_games(game_ids, top_k, distance, filters, dims);
        let results = self.post_similar(&request).await?;
        Ok(rank_candidates(results, game_ids, distance, top_k))
    }

    async fn game_complexity(&self, game_id: i64) -> Result<Option<f64>> {
        if self.complexity_unsupported.load(Ordering::Relaxed) {
            debug!("Skipping complexity lookup for game_id={}; endpoint unsupported", game_id);
            return Ok(None);
        }

        let builder = self.http_client.get(self.url(&format!("/games/{}", game_id)));

        match self.send_json::<GameResponse>(builder).await {
            Ok(game) => Ok(game.complexity.filter(|c| c.is_finite())),
            Err(SimilarityError::Service(ServiceError::Status { status, .. }))
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                debug!("Game {} not known to similarity service", game_id);
                Ok(None)
            }
            Err(SimilarityError::Service(ServiceError::Status { status, .. }))
                if status == StatusCode::METHOD_NOT_ALLOWED.as_u16()
                    || status == StatusCode::NOT_IMPLEMENTED.as_u16() =>
            {
                if !self.complexity_unsupported.swap(true, Ordering::Relaxed) {
                    warn!(
                        "Similarity service does not support complexity lookups ({}); relative complexity filters will be ignored",
                        status
                    );
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        let start = Instant::now();
        let result = self.service_health().await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        Ok(match result {
            Ok(body) => {
                let status = body
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("healthy")
                    .to_string();
                BackendHealth {
                    backend: BackendKind::Service,
                    healthy: matches!(status.as_str(), "healthy" | "ok"),
                    message: Some(format!("Service status: {}", status)),
                    response_time_ms,
                }
            }
            Err(e) => BackendHealth {
                backend: BackendKind::Service,
                healthy: false,
                message: Some(e.to_string()),
                response_time_ms,
            },
        })
    }

    fn circuit_breaker(&self) -> Option<Arc<CircuitBreaker>> {
        self.circuit_breaker.clone()
    }
}
