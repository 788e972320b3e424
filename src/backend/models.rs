//! Data models shared by the similarity backends

use serde::{Deserialize, Serialize};
use std::fmt;

/// One ranked result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub game_id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub year_published: Option<i32>,

    /// Number of users who rated the game
    #[serde(default)]
    pub users_rated: Option<i64>,

    #[serde(default)]
    pub average_rating: Option<f64>,

    /// Bayesian-adjusted aggregate rating
    #[serde(default)]
    pub geek_rating: Option<f64>,

    #[serde(default)]
    pub complexity: Option<f64>,

    #[serde(default)]
    pub thumbnail: Option<String>,

    /// Distance (cosine/euclidean) or score (dot product) to the query vector
    pub distance: f64,
}

/// Which backend variant serves searches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQL issued straight against the warehouse
    Direct,
    /// Remote scoring service over HTTP
    Service,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Direct => f.write_str("direct"),
            BackendKind::Service => f.write_str("service"),
        }
    }
}

/// Result of a backend health probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub backend: BackendKind,

    pub healthy: bool,

    /// Free-form detail reported by the backend
    pub message: Option<String>,

    pub response_time_ms: u64,
}
