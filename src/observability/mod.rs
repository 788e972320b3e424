//! Observability: logging setup and health checks

pub mod health;

use crate::config::LoggingConfig;
use crate::error::{Result, SimilarityError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use health::{ComponentHealth, HealthChecker, HealthStatus, SystemHealth};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format.as_str() {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        "pretty" => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer().compact()).try_init(),
    };

    result.map_err(|e| SimilarityError::Internal(format!("Failed to initialize tracing: {}", e)))
}
