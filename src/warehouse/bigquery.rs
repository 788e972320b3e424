//! BigQuery REST client for the `jobs.query` endpoint

use super::auth::{token_source, TokenSource};
use super::models::{ErrorResponse, QueryParameter, QueryRequest, QueryResponse, Row, WireParameter};
use super::{TableRef, Warehouse};
use crate::config::WarehouseConfig;
use crate::error::{Result, WarehouseError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Extra time the HTTP client waits beyond the warehouse's own query timeout
const HTTP_GRACE: Duration = Duration::from_secs(5);

/// Warehouse client that runs synchronous queries through the BigQuery REST API
pub struct BigQueryWarehouse {
    http_client: Client,
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
    location: Option<String>,
    timeout_ms: u64,
    max_retries: u32,
}

impl BigQueryWarehouse {
    /// Create a client billing queries to the project that owns the similarity table
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        Self::with_token_source(config, token_source(config)?)
    }

    /// Create a client that authenticates with `tokens`
    pub fn with_token_source(config: &WarehouseConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let table = TableRef::parse(&config.table_id)?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let http_client = Client::builder()
            .timeout(timeout + HTTP_GRACE)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(WarehouseError::Http)?;

        let endpoint = format!(
            "{}/projects/{}/queries",
            config.api_url.trim_end_matches('/'),
            table.project
        );

        info!("BigQuery warehouse client initialized for project={}", table.project);

        Ok(Self {
            http_client,
            endpoint,
            tokens,
            location: config.location.clone(),
            timeout_ms: config.timeout_secs * 1000,
            max_retries: config.max_retries,
        })
    }

    fn build_request(&self, sql: &str, params: &[QueryParameter]) -> QueryRequest {
        QueryRequest {
            query: sql.to_string(),
            use_legacy_sql: false,
            parameter_mode: "NAMED".to_string(),
            query_parameters: params.iter().map(WireParameter::from).collect(),
            timeout_ms: self.timeout_ms,
            location: self.location.clone(),
        }
    }

    /// Post the query, retrying transient failures with exponential backoff
    async fn make_request(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            // Fetched per attempt so refreshed credentials are picked up
            let mut builder = self.http_client.post(&self.endpoint).json(request);
            if let Some(token) = self.tokens.access_token().await? {
                builder = builder.bearer_auth(token.expose_secret());
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<QueryResponse>()
                            .await
                            .map_err(WarehouseError::Http)?;
                        debug!("Warehouse query succeeded after {} attempts", attempts);
                        return Ok(parsed);
                    }

                    let body = response.text().await.unwrap_or_default();
                    let message = serde_json::from_str::<ErrorResponse>(&body)
                        .map(|e| e.error.message)
                        .unwrap_or(body);

                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        error!(
                            "Warehouse rejected credentials ({}): {}; check the access token or service account",
                            status, message
                        );
                        return Err(WarehouseError::Unauthorized {
                            status: status.as_u16(),
                            message,
                        }
                        .into());
                    }
                    error!("Warehouse API error {}: {}", status, message);

                    let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempts <= self.max_retries {
                        let backoff = Self::backoff(attempts, status == StatusCode::TOO_MANY_REQUESTS);
                        debug!("Retrying warehouse query in {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    return Err(WarehouseError::Api {
                        status: status.as_u16(),
                        message,
                    }
                    .into());
                }
                Err(e) => {
                    warn!("Network error during warehouse query: {}", e);

                    if attempts <= self.max_retries {
                        let backoff = Self::backoff(attempts, false);
                        debug!("Retrying warehouse query in {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    return Err(WarehouseError::Http(e).into());
                }
            }
        }
    }

    fn backoff(attempts: u32, rate_limited: bool) -> Duration {
        let base = Duration::from_millis(100 * 2_u64.pow(attempts.min(6)));
        if rate_limited {
            base + Duration::from_millis(rand::random::<u64>() % 1000)
        } else {
            base
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn query(&self, sql: &str, params: &[QueryParameter]) -> Result<Vec<Row>> {
        let request = self.build_request(sql, params);
        let response = self.make_request(&request).await?;

        if !response.job_complete {
            return Err(WarehouseError::Incomplete {
                timeout_ms: self.timeout_ms,
            }
            .into());
        }

        let rows = response.into_rows()?;
        debug!("Warehouse query returned {} rows", rows.len());
        Ok(rows)
    }
}
