//! Backend selection policy
//!
//! The backend is chosen once, when the search facade is built. There is no
//! fallback between backends at call time: a failing backend reports its own
//! failure.

use super::circuit_breaker::CircuitBreakerConfig;
use super::direct::DirectSimilarityClient;
use super::models::BackendKind;
use super::service::ServiceSimilarityClient;
use super::SimilarityBackend;
use crate::config::{BackendConfig, Config};
use crate::error::{Result, SimilarityError};
use crate::warehouse::{BigQueryWarehouse, TableRef};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Decide which backend a configuration selects.
///
/// `force_direct` wins; otherwise a configured service URL selects the
/// service; otherwise direct.
pub fn select_backend(config: &BackendConfig) -> BackendKind {
    if config.force_direct {
        return BackendKind::Direct;
    }

    match config.service_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => BackendKind::Service,
        _ => BackendKind::Direct,
    }
}

/// Construct the backend selected by `config`
pub fn build_backend(config: &Config) -> Result<Arc<dyn SimilarityBackend>> {
    let kind = select_backend(&config.backend);
    info!("Selected {} similarity backend", kind);

    match kind {
        BackendKind::Service => {
            let url = config
                .backend
                .service_url
                .as_deref()
                .map(str::trim)
                .ok_or_else(|| {
                    SimilarityError::Config("Service backend selected without a URL".to_string())
                })?;

            let mut client = ServiceSimilarityClient::new(
                url,
                Duration::from_secs(config.backend.service_timeout_secs),
            )?;

            if config.backend.circuit_breaker_enabled {
                client = client.with_circuit_breaker(CircuitBreakerConfig {
                    failure_threshold: config.backend.circuit_failure_threshold,
                    reset_timeout: Duration::from_secs(config.backend.circuit_reset_secs),
                    ..CircuitBreakerConfig::default()
                });
            }

            Ok(Arc::new(client))
        }
        BackendKind::Direct => {
            let table = TableRef::parse(&config.warehouse.table_id)?;
            let warehouse = BigQueryWarehouse::new(&config.warehouse)?;
            Ok(Arc::new(DirectSimilarityClient::new(table, Arc::new(warehouse))))
        }
    }
}
