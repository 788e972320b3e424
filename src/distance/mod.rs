//! Distance metrics and embedding resolutions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::SimilarityError;

/// Distance metric used to rank candidates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceType {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

/// Direction in which the `distance` column is sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    /// Smaller is more similar
    Ascending,
    /// Larger is more similar
    Descending,
}

impl DistanceType {
    /// Name passed through to the warehouse distance operator
    pub fn warehouse_name(&self) -> &'static str {
        match self {
            DistanceType::Cosine => "COSINE",
            DistanceType::Euclidean => "EUCLIDEAN",
            DistanceType::DotProduct => "DOT_PRODUCT",
        }
    }

    /// Name used on the wire and in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceType::Cosine => "cosine",
            DistanceType::Euclidean => "euclidean",
            DistanceType::DotProduct => "dot_product",
        }
    }

    pub fn rank_order(&self) -> RankOrder {
        match self {
            DistanceType::Cosine | DistanceType::Euclidean => RankOrder::Ascending,
            DistanceType::DotProduct => RankOrder::Descending,
        }
    }
}

impl RankOrder {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            RankOrder::Ascending => "ASC",
            RankOrder::Descending => "DESC",
        }
    }
}

impl fmt::Display for DistanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceType {
    type Err = SimilarityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceType::Cosine),
            "euclidean" => Ok(DistanceType::Euclidean),
            "dot_product" | "dot" => Ok(DistanceType::DotProduct),
            other => Err(SimilarityError::InvalidRequest(format!(
                "Unknown distance type: {}",
                other
            ))),
        }
    }
}

/// Embedding resolution, i.e. which precomputed vector column is read
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(into = "u32", try_from = "u32")]
pub enum EmbeddingDims {
    D8,
    D16,
    D32,
    #[default]
    D64,
}

impl EmbeddingDims {
    pub const SUPPORTED: [u32; 4] = [8, 16, 32, 64];

    /// Map a requested resolution to a supported one.
    ///
    /// Unset and unsupported values fall back to the full 64-component
    /// embedding rather than failing the search.
    pub fn from_requested(requested: Option<u32>) -> Self {
        match requested {
            None | Some(64) => EmbeddingDims::D64,
            Some(8) => EmbeddingDims::D8,
            Some(16) => EmbeddingDims::D16,
            Some(32) => EmbeddingDims::D32,
            Some(other) => {
                debug!("Unsupported embedding_dims={}, using full resolution", other);
                EmbeddingDims::D64
            }
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EmbeddingDims::D8 => 8,
            EmbeddingDims::D16 => 16,
            EmbeddingDims::D32 => 32,
            EmbeddingDims::D64 => 64,
        }
    }

    /// Warehouse column holding embeddings at this resolution
    pub fn column(&self) -> &'static str {
        match self {
            EmbeddingDims::D8 => "embedding_8",
            EmbeddingDims::D16 => "embedding_16",
            EmbeddingDims::D32 => "embedding_32",
            EmbeddingDims::D64 => "embedding",
        }
    }
}

impl From<EmbeddingDims> for u32 {
    fn from(dims: EmbeddingDims) -> Self {
        dims.as_u32()
    }
}

impl TryFrom<u32> for EmbeddingDims {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(EmbeddingDims::D8),
            16 => Ok(EmbeddingDims::D16),
            32 => Ok(EmbeddingDims::D32),
            64 => Ok(EmbeddingDims::D64),
            other => Err(format!("unsupported embedding dims: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_distance_type() {
        assert_eq!("cosine".parse::<DistanceType>().unwrap(), DistanceType::Cosine);
        assert_eq!("EUCLIDEAN".parse::<DistanceType>().unwrap(), DistanceType::Euclidean);
        assert_eq!("dot_product".parse::<DistanceType>().unwrap(), DistanceType::DotProduct);
        assert!("manhattan".parse::<DistanceType>().is_err());
    }

    #[test]
    fn test_rank_order() {
        assert_eq!(DistanceType::Cosine.rank_order(), RankOrder::Ascending);
        assert_eq!(DistanceType::Euclidean.rank_order(), RankOrder::Ascending);
        assert_eq!(DistanceType::DotProduct.rank_order(), RankOrder::Descending);
        assert_eq!(DistanceType::DotProduct.warehouse_name(), "DOT_PRODUCT");
    }

    #[test]
    fn test_embedding_dims_fallback() {
        assert_eq!(EmbeddingDims::from_requested(None), EmbeddingDims::D64);
        assert_eq!(EmbeddingDims::from_requested(Some(16)), EmbeddingDims::D16);
        assert_eq!(EmbeddingDims::from_requested(Some(12)), EmbeddingDims::D64);
        assert_eq!(EmbeddingDims::from_requested(Some(128)).column(), "embedding");
        assert_eq!(EmbeddingDims::D8.column(), "embedding_8");
    }

    #[test]
    fn test_embedding_dims_serde() {
        let json = serde_json::to_string(&EmbeddingDims::D32).unwrap();
        assert_eq!(json, "32");
        let parsed: EmbeddingDims = serde_json::from_str("8").unwrap();
        assert_eq!(parsed, EmbeddingDims::D8);
        assert!(serde_json::from_str::<EmbeddingDims>("7").is_err());
    }
}
