//! Search filter model
//!
//! [`SimilarityFilters`] is what callers build: absolute bounds plus an
//! optional relative complexity request. [`FilterBounds`] is what the query
//! composer and the backends consume: absolute bounds only, produced by the
//! resolver. Keeping them as separate types means a relative request can
//! never reach a backend unresolved.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lowest complexity (weight) a game can have
pub const MIN_COMPLEXITY: f64 = 1.0;

/// Highest complexity (weight) a game can have
pub const MAX_COMPLEXITY: f64 = 5.0;

/// Band used when a relative mode is requested without one
pub const DEFAULT_COMPLEXITY_BAND: f64 = 0.5;

/// Relative complexity request, anchored on the query game's own complexity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityMode {
    /// Within `band` of the query game, either direction
    WithinBand,
    /// Up to `band` lighter than the query game
    LessComplex,
    /// Up to `band` heavier than the query game
    MoreComplex,
}

/// Filter criteria for a similarity search.
///
/// Fields set to `None` are not filtered on. When `complexity_mode` is set,
/// `min_complexity`/`max_complexity` are ignored and the bounds are derived
/// from the query game instead.
///
/// # Example
///
/// ```rust
/// use game_similarity::filters::{ComplexityMode, SimilarityFilters};
///
/// let filters = SimilarityFilters {
///     min_year: Some(2010),
///     complexity_mode: Some(ComplexityMode::WithinBand),
///     ..SimilarityFilters::default()
/// };
/// assert!(filters.has_any_filter());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_users_rated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users_rated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_geek_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_geek_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_complexity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_complexity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_mode: Option<ComplexityMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_band: Option<f64>,
}

/// Absolute-only bounds, the resolved form of [`SimilarityFilters`].
///
/// All bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_users_rated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_users_rated: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_geek_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_geek_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_complexity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_complexity: Option<f64>,
}

impl SimilarityFilters {
    /// True when any bound or a relative complexity mode is set
    pub fn has_any_filter(&self) -> bool {
        self.complexity_mode.is_some() || self.absolute_fields().has_any_filter()
    }

    /// Transport-neutral key/value form, unset fields omitted
    pub fn to_map(&self) -> IndexMap<String, Value> {
        let mut map = self.absolute_fields().to_map();
        if let Some(mode) = self.complexity_mode {
            map.insert(
                "complexity_mode".to_string(),
                serde_json::to_value(mode).unwrap_or(Value::Null),
            );
        }
        if let Some(band) = self.complexity_band {
            map.insert("complexity_band".to_string(), Value::from(band));
        }
        map
    }

    /// Band to apply for a relative request
    pub fn effective_band(&self) -> f64 {
        self.complexity_band.unwrap_or(DEFAULT_COMPLEXITY_BAND)
    }

    /// Absolute bounds as a caller with no anchor game would see them.
    ///
    /// The complexity pair is dropped when a relative mode is set because
    /// relative mode takes precedence over it.
    pub fn absolute_bounds(&self) -> FilterBounds {
        let mut bounds = self.absolute_fields();
        if self.complexity_mode.is_some() {
            bounds.min_complexity = None;
            bounds.max_complexity = None;
        }
        bounds
    }

    /// Same filters with the relative request removed
    pub fn without_relative(&self) -> Self {
        Self {
            complexity_mode: None,
            complexity_band: None,
            ..self.clone()
        }
    }

    fn absolute_fields(&self) -> FilterBounds {
        FilterBounds {
            min_year: self.min_year,
            max_year: self.max_year,
            min_users_rated: self.min_users_rated,
            max_users_rated: self.max_users_rated,
            min_rating: self.min_rating,
            max_rating: self.max_rating,
            min_geek_rating: self.min_geek_rating,
            max_geek_rating: self.max_geek_rating,
            min_complexity: self.min_complexity,
            max_complexity: self.max_complexity,
        }
    }
}

impl FilterBounds {
    pub fn has_any_filter(&self) -> bool {
        self.min_year.is_some()
            || self.max_year.is_some()
            || self.min_users_rated.is_some()
            || self.max_users_rated.is_some()
            || self.min_rating.is_some()
            || self.max_rating.is_some()
            || self.min_geek_rating.is_some()
            || self.max_geek_rating.is_some()
            || self.min_complexity.is_some()
            || self.max_complexity.is_some()
    }

    /// Transport-neutral key/value form, unset fields omitted
    pub fn to_map(&self) -> IndexMap<String, Value> {
        let mut map = IndexMap::new();
        insert_set(&mut map, "min_year", self.min_year);
        insert_set(&mut map, "max_year", self.max_year);
        insert_set(&mut map, "min_users_rated", self.min_users_rated);
        insert_set(&mut map, "max_users_rated", self.max_users_rated);
        insert_set(&mut map, "min_rating", self.min_rating);
        insert_set(&mut map, "max_rating", self.max_rating);
        insert_set(&mut map, "min_geek_rating", self.min_geek_rating);
        insert_set(&mut map, "max_geek_rating", self.max_geek_rating);
        insert_set(&mut map, "min_complexity", self.min_complexity);
        insert_set(&mut map, "max_complexity", self.max_complexity);
        map
    }

    /// Copy with the complexity pair replaced
    pub fn with_complexity(&self, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min_complexity: min,
            max_complexity: max,
            ..*self
        }
    }
}

impl From<FilterBounds> for SimilarityFilters {
    fn from(bounds: FilterBounds) -> Self {
        Self {
            min_year: bounds.min_year,
            max_year: bounds.max_year,
            min_users_rated: bounds.min_users_rated,
            max_users_rated: bounds.max_users_rated,
            min_rating: bounds.min_rating,
            max_rating: bounds.max_rating,
            min_geek_rating: bounds.min_geek_rating,
            max_geek_rating: bounds.max_geek_rating,
            min_complexity: bounds.min_complexity,
            max_complexity: bounds.max_complexity,
            complexity_mode: None,
            complexity_band: None,
        }
    }
}

fn insert_set<T: Into<Value>>(map: &mut IndexMap<String, Value>, key: &str, value: Option<T>) {
    if let Some(v) = value {
        map.insert(key.to_string(), v.into());
    }
}
