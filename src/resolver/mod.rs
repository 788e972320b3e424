//! Relative-filter resolution
//!
//! "More complex than this game" can only be expressed as absolute bounds
//! once the query game's own complexity is known. Resolution runs as a
//! separate phase before any ranking query is composed, and always yields a
//! new [`FilterBounds`] without touching the caller's filters.

use crate::backend::SimilarityBackend;
use crate::cache::ResultCache;
use crate::error::Result;
use crate::filters::{
    ComplexityMode, FilterBounds, SimilarityFilters, DEFAULT_COMPLEXITY_BAND, MAX_COMPLEXITY,
    MIN_COMPLEXITY,
};
use tracing::{debug, warn};

/// Absolute complexity bounds for a relative mode, clamped to the domain
pub fn relative_bounds(mode: ComplexityMode, complexity: f64, band: f64) -> (f64, f64) {
    let clamp = |v: f64| v.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);

    match mode {
        ComplexityMode::WithinBand => (clamp(complexity - band), clamp(complexity + band)),
        ComplexityMode::LessComplex => (clamp(complexity - band), clamp(complexity)),
        ComplexityMode::MoreComplex => (clamp(complexity), clamp(complexity + band)),
    }
}

/// Resolve filters against an already known query-game complexity.
///
/// With a relative mode and no complexity on record, no complexity bound is
/// applied at all and one warning is logged.
pub fn resolve_with(filters: &SimilarityFilters, complexity: Option<f64>) -> FilterBounds {
    let bounds = filters.absolute_bounds();

    let Some(mode) = filters.complexity_mode else {
        return bounds;
    };

    match complexity.filter(|c| c.is_finite()) {
        Some(c) => {
            let band = sanitized_band(filters.complexity_band);
            let (min, max) = relative_bounds(mode, c, band);
            debug!(
                "Resolved {:?} around complexity {} (band {}) to [{}, {}]",
                mode, c, band, min, max
            );
            bounds.with_complexity(Some(min), Some(max))
        }
        None => {
            warn!(
                "Query game has no complexity on record; ignoring {:?} complexity filter",
                mode
            );
            bounds
        }
    }
}

/// Resolve filters for a single-game search, looking up the query game's
/// complexity only when a relative mode is set.
///
/// Lookup errors propagate; a missing value falls back as in [`resolve_with`].
pub async fn resolve(
    backend: &dyn SimilarityBackend,
    game_id: i64,
    filters: &SimilarityFilters,
) -> Result<FilterBounds> {
    resolve_cached(backend, None, game_id, filters).await
}

/// [`resolve`], consulting and filling the complexity side-cache
pub async fn resolve_cached(
    backend: &dyn SimilarityBackend,
    cache: Option<&ResultCache>,
    game_id: i64,
    filters: &SimilarityFilters,
) -> Result<FilterBounds> {
    if filters.complexity_mode.is_none() {
        return Ok(filters.absolute_bounds());
    }

    let cached = match cache {
        Some(cache) => cache.get_complexity(game_id).await,
        None => None,
    };

    let complexity = match cached {
        Some(complexity) => {
            debug!("Complexity for game_id={} served from cache", game_id);
            complexity
        }
        None => {
            // Only a successful lookup is cached; a failure must not pin a miss
            let complexity = backend.game_complexity(game_id).await?;
            if let Some(cache) = cache {
                cache.insert_complexity(game_id, complexity).await;
            }
            complexity
        }
    };

    Ok(resolve_with(filters, complexity))
}

/// Resolve filters for a multi-game search.
///
/// There is no single anchor game, so a relative mode is ignored with a
/// warning and no complexity bound is applied.
pub fn resolve_for_many(filters: &SimilarityFilters) -> FilterBounds {
    if let Some(mode) = filters.complexity_mode {
        warn!(
            "{:?} complexity filter is not supported for multi-game searches; ignoring it",
            mode
        );
    }
    filters.absolute_bounds()
}

fn sanitized_band(band: Option<f64>) -> f64 {
    match band {
        None => DEFAULT_COMPLEXITY_BAND,
        Some(b) if b.is_finite() && b > 0.0 => b,
        Some(b) => {
            warn!(
                "Invalid complexity band {}; using default {}",
                b, DEFAULT_COMPLEXITY_BAND
            );
            DEFAULT_COMPLEXITY_BAND
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("bound should be set");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn relative(mode: ComplexityMode, band: Option<f64>) -> SimilarityFilters {
        SimilarityFilters {
            complexity_mode: Some(mode),
            complexity_band: band,
            ..SimilarityFilters::default()
        }
    }

    #[test]
    fn test_relative_bounds() {
        assert_eq!(relative_bounds(ComplexityMode::WithinBand, 3.0, 0.5), (2.5, 3.5));
        assert_eq!(relative_bounds(ComplexityMode::LessComplex, 3.0, 0.5), (2.5, 3.0));
        assert_eq!(relative_bounds(ComplexityMode::MoreComplex, 3.0, 0.5), (3.0, 3.5));
    }

    #[test]
    fn test_relative_bounds_clamped() {
        assert_eq!(relative_bounds(ComplexityMode::WithinBand, 1.2, 0.5), (1.0, 1.7));
        assert_eq!(relative_bounds(ComplexityMode::MoreComplex, 4.8, 1.0), (4.8, 5.0));
        assert_eq!(relative_bounds(ComplexityMode::LessComplex, 1.1, 2.0), (1.0, 1.1));
    }

    #[test]
    fn test_resolve_with_known_complexity() {
        let filters = SimilarityFilters {
            min_year: Some(2000),
            min_complexity: Some(4.0),
            ..relative(ComplexityMode::WithinBand, None)
        };

        let bounds = resolve_with(&filters, Some(2.8));
        approx(bounds.min_complexity, 2.3);
        approx(bounds.max_complexity, 3.3);
        assert_eq!(bounds.min_year, Some(2000));
    }

    #[test]
    fn test_resolve_with_missing_complexity_drops_bound() {
        let filters = SimilarityFilters {
            max_complexity: Some(2.0),
            ..relative(ComplexityMode::MoreComplex, Some(1.0))
        };

        let bounds = resolve_with(&filters, None);
        assert_eq!(bounds.min_complexity, None);
        assert_eq!(bounds.max_complexity, None);
        assert!(!bounds.has_any_filter());
    }

    #[test]
    fn test_absolute_filters_pass_through() {
        let filters = SimilarityFilters {
            min_complexity: Some(2.0),
            max_complexity: Some(3.0),
            ..SimilarityFilters::default()
        };
        let bounds = resolve_with(&filters, Some(4.5));
        assert_eq!(bounds.min_complexity, Some(2.0));
        assert_eq!(bounds.max_complexity, Some(3.0));
    }

    #[test]
    fn test_invalid_band_uses_default() {
        let bounds = resolve_with(&relative(ComplexityMode::WithinBand, Some(-1.0)), Some(3.0));
        assert_eq!(bounds.min_complexity, Some(2.5));
        assert_eq!(bounds.max_complexity, Some(3.5));

        let bounds = resolve_with(&relative(ComplexityMode::WithinBand, Some(f64::NAN)), Some(3.0));
        assert_eq!(bounds.min_complexity, Some(2.5));
    }

    #[test]
    fn test_resolve_for_many_ignores_relative_mode() {
        let filters = SimilarityFilters {
            min_rating: Some(7.0),
            ..relative(ComplexityMode::LessComplex, Some(1.0))
        };
        let bounds = resolve_for_many(&filters);
        assert_eq!(bounds.min_rating, Some(7.0));
        assert_eq!(bounds.min_complexity, None);
        assert_eq!(bounds.max_complexity, None);
    }

    #[test]
    fn test_caller_filters_untouched() {
        let filters = relative(ComplexityMode::WithinBand, Some(0.5));
        let before = filters.clone();
        let _ = resolve_with(&filters, Some(3.0));
        assert_eq!(filters, before);
    }
}
