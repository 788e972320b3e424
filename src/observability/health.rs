//! Health checks for operator visibility

use crate::backend::{CircuitBreaker, CircuitState, SimilarityBackend};
use crate::cache::ResultCache;
use crate::search::SimilaritySearch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Upper bound on a single backend probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Component health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,

    pub status: HealthStatus,

    pub message: Option<String>,

    /// Response time in milliseconds
    pub response_time_ms: Option<u64>,
}

/// Overall health of the search subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,

    pub uptime_secs: u64,

    pub components: Vec<ComponentHealth>,

    /// Unix timestamp of the check
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
struct CachedHealth {
    result: SystemHealth,
    cached_at: Instant,
}

/// Health checker with caching
pub struct HealthChecker {
    start_time: Instant,
    backend: Arc<dyn SimilarityBackend>,
    cache: Option<Arc<ResultCache>>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    cached_result: RwLock<Option<CachedHealth>>,
    cache_ttl: Duration,
}

impl HealthChecker {
    /// Create a health checker with a 30-second result TTL
    pub fn new(backend: Arc<dyn SimilarityBackend>) -> Self {
        Self::with_cache_ttl(backend, Duration::from_secs(30))
    }

    /// Also reports on the backend's circuit breaker when it has one
    pub fn with_cache_ttl(backend: Arc<dyn SimilarityBackend>, cache_ttl: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            circuit_breaker: backend.circuit_breaker(),
            backend,
            cache: None,
            cached_result: RwLock::new(None),
            cache_ttl,
        }
    }

    /// Checker covering a search facade's backend, breaker and cache
    pub fn for_search(search: &SimilaritySearch) -> Self {
        let checker = Self::new(search.backend().clone());
        match search.cache() {
            Some(cache) => checker.with_cache(cache.clone()),
            None => checker,
        }
    }

    /// Report on the result cache too
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Report on a circuit breaker the backend does not expose
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    /// Check overall health, reusing a recent result
    pub async fn check_health(&self) -> SystemHealth {
        {
            let cached = self.cached_result.read().await;
            if let Some(cached_health) = &*cached {
                if cached_health.cached_at.elapsed() < self.cache_ttl {
                    debug!("Returning cached health check result");
                    return cached_health.result.clone();
                }
            }
        }

        self.check_health_fresh().await
    }

    /// Force a fresh check, bypassing the cached result
    pub async fn check_health_fresh(&self) -> SystemHealth {
        debug!("Performing fresh health check");
        let health = self.perform_health_check().await;

        *self.cached_result.write().await = Some(CachedHealth {
            result: health.clone(),
            cached_at: Instant::now(),
        });

        health
    }

    async fn perform_health_check(&self) -> SystemHealth {
        let mut components = vec![self.check_backend().await, self.check_cache().await];

        if let Some(cb) = &self.circuit_breaker {
            components.push(check_circuit_breaker(cb).await);
        }

        SystemHealth {
            status: overall_status(&components),
            uptime_secs: self.start_time.elapsed().as_secs(),
            components,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    async fn check_backend(&self) -> ComponentHealth {
        let name = format!("{}_backend", self.backend.kind());

        match tokio::time::timeout(PROBE_TIMEOUT, self.backend.health_check()).await {
            Ok(Ok(health)) => ComponentHealth {
                name,
                status: if health.healthy {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                },
                message: health.message,
                response_time_ms: Some(health.response_time_ms),
            },
            Ok(Err(e)) => ComponentHealth {
                name,
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
                response_time_ms: None,
            },
            Err(_) => ComponentHealth {
                name,
                status: HealthStatus::Unhealthy,
                message: Some("Health check timeout".to_string()),
                response_time_ms: Some(PROBE_TIMEOUT.as_millis() as u64),
            },
        }
    }

    async fn check_cache(&self) -> ComponentHealth {
        match &self.cache {
            Some(cache) => {
                let stats = cache.stats().await;
                ComponentHealth {
                    name: "result_cache".to_string(),
                    status: HealthStatus::Healthy,
                    message: Some(format!(
                        "{} result sets, {} complexities cached (ttl: {:?})",
                        stats.results,
                        stats.complexities,
                        cache.ttl()
                    )),
                    response_time_ms: None,
                }
            }
            None => ComponentHealth {
                name: "result_cache".to_string(),
                status: HealthStatus::Degraded,
                message: Some("Disabled; every search hits the backend".to_string()),
                response_time_ms: None,
            },
        }
    }

    /// Readiness: nothing is outright unhealthy
    pub async fn readiness(&self) -> bool {
        self.check_health().await.status != HealthStatus::Unhealthy
    }
}

async fn check_circuit_breaker(cb: &CircuitBreaker) -> ComponentHealth {
    let (status, message) = match cb.state().await {
        CircuitState::Closed => (HealthStatus::Healthy, "Circuit closed - normal operation"),
        CircuitState::Open => (HealthStatus::Unhealthy, "Circuit open - service unavailable"),
        CircuitState::HalfOpen => (HealthStatus::Degraded, "Circuit half-open - testing recovery"),
    };

    ComponentHealth {
        name: "circuit_breaker".to_string(),
        status,
        message: Some(message.to_string()),
        response_time_ms: None,
    }
}

fn overall_status(components: &[ComponentHealth]) -> HealthStatus {
    if components.iter().all(|c| c.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    }
}
