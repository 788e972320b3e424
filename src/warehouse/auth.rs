//! Access tokens for the warehouse API
//!
//! A token is requested before every query attempt. Google credentials
//! (service-account key files or application default credentials) are
//! refreshed by `gcp_auth` before they expire; a configured static token is
//! sent as is.

use crate::config::WarehouseConfig;
use crate::error::{Result, SimilarityError, WarehouseError};
use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use secrecy::Secret;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// OAuth scope for running BigQuery jobs
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Source of bearer tokens for warehouse requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current token, or `None` to send requests unauthenticated
    async fn access_token(&self) -> Result<Option<Secret<String>>>;
}

/// A fixed token from configuration, or none at all
pub struct StaticToken(Option<Secret<String>>);

impl StaticToken {
    pub fn new(token: Option<Secret<String>>) -> Self {
        Self(token)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<Option<Secret<String>>> {
        Ok(self.0.clone())
    }
}

/// Refreshing Google credentials
pub struct GoogleCredentials {
    provider: OnceCell<Arc<dyn TokenProvider>>,
}

impl GoogleCredentials {
    /// Credentials from a service-account key file
    pub fn from_file(path: &str) -> Result<Self> {
        let account = CustomServiceAccount::from_file(path).map_err(|e| {
            SimilarityError::Config(format!(
                "Cannot load service account credentials from {}: {}",
                path, e
            ))
        })?;

        info!("Using service account credentials from {}", path);
        Ok(Self {
            provider: OnceCell::new_with(Some(Arc::new(account) as Arc<dyn TokenProvider>)),
        })
    }

    /// Application default credentials, discovered on first use
    pub fn application_default() -> Self {
        Self {
            provider: OnceCell::new(),
        }
    }

    async fn provider(&self) -> Result<&Arc<dyn TokenProvider>> {
        self.provider
            .get_or_try_init(|| async {
                let provider = gcp_auth::provider().await.map_err(auth_error)?;
                info!("Discovered application default credentials");
                Ok::<_, SimilarityError>(provider)
            })
            .await
    }
}

#[async_trait]
impl TokenSource for GoogleCredentials {
    async fn access_token(&self) -> Result<Option<Secret<String>>> {
        let token = self
            .provider()
            .await?
            .token(&[BIGQUERY_SCOPE])
            .await
            .map_err(auth_error)?;

        debug!("Obtained warehouse access token");
        Ok(Some(Secret::new(token.as_str().to_string())))
    }
}

fn auth_error(e: gcp_auth::Error) -> SimilarityError {
    WarehouseError::Auth(e.to_string()).into()
}

/// Pick the credential source a configuration asks for.
///
/// A static `access_token` wins, then `credentials_file`, then application
/// default credentials when `default_credentials` is set. Otherwise requests
/// go out without an `Authorization` header.
pub fn token_source(config: &WarehouseConfig) -> Result<Arc<dyn TokenSource>> {
    if config.access_token.is_some() {
        return Ok(Arc::new(StaticToken::new(config.access_token.clone())));
    }

    if let Some(path) = config.credentials_file.as_deref().map(str::trim) {
        if !path.is_empty() {
            return Ok(Arc::new(GoogleCredentials::from_file(path)?));
        }
    }

    if config.default_credentials {
        return Ok(Arc::new(GoogleCredentials::application_default()));
    }

    debug!("No warehouse credentials configured; sending unauthenticated requests");
    Ok(Arc::new(StaticToken::new(None)))
}
