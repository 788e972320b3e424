//! Query composition: resolved requests to backend-specific form

pub mod payload;
pub mod sql;

pub use payload::SimilarRequest;
pub use sql::{complexity_sql, filter_clause, filter_clauses, games_like_sql, similar_games_sql};
