//! Game Similarity - embedding-based "games like this one" search
//!
//! This library ranks board games by distance in a learned embedding space,
//! with semantic filters on year, popularity, ratings and complexity,
//! including complexity relative to the query game.
//!
//! ## Features
//!
//! - **Two Backends, One Contract**: direct warehouse SQL or a remote scoring service
//! - **Relative Filters**: "less/more complex than this game" resolved before ranking
//! - **Distance Metrics**: cosine, euclidean and dot product at 8/16/32/64 dimensions
//! - **Result Caching**: TTL cache keyed by the fully resolved request
//! - **Circuit Breaker Protection**: fail fast while the scoring service is down
//! - **Observability**: structured logging and health checks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use game_similarity::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     init_tracing(&config.logging)?;
//!
//!     let search = SimilaritySearch::from_config(&config)?;
//!
//!     let query = SimilarityQuery::new(174430)
//!         .top_k(5)
//!         .distance(DistanceType::Cosine)
//!         .filters(SimilarityFilters {
//!             min_year: Some(2010),
//!             complexity_mode: Some(ComplexityMode::WithinBand),
//!             complexity_band: Some(0.5),
//!             ..SimilarityFilters::default()
//!         });
//!
//!     for game in search.find_similar_games(&query).await?.iter() {
//!         println!("{} ({:.3})", game.name, game.distance);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod compose;
pub mod config;
pub mod distance;
pub mod error;
pub mod filters;
pub mod observability;
pub mod resolver;
pub mod search;
pub mod warehouse;

pub use config::Config;
pub use error::{Result, SimilarityError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::{BackendKind, Candidate, SimilarityBackend};
    pub use crate::cache::ResultCache;
    pub use crate::config::Config;
    pub use crate::distance::{DistanceType, EmbeddingDims};
    pub use crate::error::{Result, SimilarityError};
    pub use crate::filters::{ComplexityMode, FilterBounds, SimilarityFilters};
    pub use crate::observability::{init_tracing, HealthChecker};
    pub use crate::search::{MultiSimilarityQuery, SimilarityQuery, SimilaritySearch};
}
