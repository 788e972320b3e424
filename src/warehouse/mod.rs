//! Analytical warehouse access
//!
//! The warehouse is treated as an opaque SQL engine with a vector-distance
//! operator. [`Warehouse`] is the seam the direct backend talks through;
//! [`BigQueryWarehouse`] is the production implementation.

pub mod auth;
pub mod bigquery;
pub mod models;

pub use auth::{token_source, GoogleCredentials, StaticToken, TokenSource};
pub use bigquery::BigQueryWarehouse;
pub use models::{QueryParameter, Row};

use crate::error::{Result, SimilarityError};
use async_trait::async_trait;
use std::fmt;

/// Read-only SQL execution against the warehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run a query with named parameters and return its rows
    async fn query(&self, sql: &str, params: &[QueryParameter]) -> Result<Vec<Row>>;
}

/// Fully qualified `project.dataset.table` identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn parse(table_id: &str) -> Result<Self> {
        let parts: Vec<&str> = table_id.trim().split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if [project, dataset, table].iter().all(|p| is_identifier(p)) =>
            {
                Ok(Self {
                    project: project.to_string(),
                    dataset: dataset.to_string(),
                    table: table.to_string(),
                })
            }
            _ => Err(SimilarityError::Config(format!(
                "Table id must look like project.dataset.table, got '{}'",
                table_id
            ))),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

// Table ids end up inside backticks in query text, so keep them to the
// characters BigQuery allows in project/dataset/table names.
fn is_identifier(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_ref() {
        let table = TableRef::parse("bgg-data-warehouse.analytics.game_similarity_search").unwrap();
        assert_eq!(table.project, "bgg-data-warehouse");
        assert_eq!(table.dataset, "analytics");
        assert_eq!(table.table, "game_similarity_search");
        assert_eq!(table.to_string(), "bgg-data-warehouse.analytics.game_similarity_search");
    }

    #[test]
    fn test_parse_table_ref_rejects_bad_ids() {
        assert!(TableRef::parse("analytics.games").is_err());
        assert!(TableRef::parse("a.b.c.d").is_err());
        assert!(TableRef::parse("proj.data`set.table").is_err());
        assert!(TableRef::parse("proj..table").is_err());
    }
}
