//! End-to-end tests for the resolve → cache → backend pipeline
//!
//! The backend double keeps a small in-memory catalogue with real vectors,
//! applies the resolved bounds the way the warehouse would, and records
//! every call so tests can assert on ordering and call counts.

use async_trait::async_trait;
use game_similarity::backend::{rank_candidates, BackendHealth, DirectSimilarityClient};
use game_similarity::compose::filter_clause;
use game_similarity::error::{ServiceError, WarehouseError};
use game_similarity::prelude::*;
use game_similarity::resolver;
use game_similarity::warehouse::{QueryParameter, Row, TableRef, Warehouse};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

struct Game {
    id: i64,
    complexity: Option<f64>,
    year: i32,
    embedding: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Complexity(i64),
    Similar(i64, FilterBounds),
    Like(Vec<i64>, FilterBounds),
}

struct CatalogueBackend {
    games: Vec<Game>,
    fail: bool,
    calls: Mutex<Vec<Call>>,
    ranking_calls: AtomicUsize,
}

impl CatalogueBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            games: catalogue(),
            fail: false,
            calls: Mutex::new(Vec::new()),
            ranking_calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            games: catalogue(),
            fail: true,
            calls: Mutex::new(Vec::new()),
            ranking_calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn ranking_calls(&self) -> usize {
        self.ranking_calls.load(Ordering::SeqCst)
    }

    fn complexity_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Complexity(_)))
            .count()
    }

    fn embedding(&self, id: i64) -> Option<[f64; 3]> {
        self.games.iter().find(|g| g.id == id).map(|g| g.embedding)
    }

    fn rank(
        &self,
        target: [f64; 3],
        excluded: &[i64],
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
    ) -> Vec<Candidate> {
        let candidates = self
            .games
            .iter()
            .filter(|g| matches(g, filters))
            .map(|g| Candidate {
                game_id: g.id,
                name: format!("Game {}", g.id),
                year_published: Some(g.year),
                users_rated: None,
                average_rating: None,
                geek_rating: None,
                complexity: g.complexity,
                thumbnail: None,
                distance: score(distance, &g.embedding, &target),
            })
            .collect();

        rank_candidates(candidates, excluded, distance, top_k)
    }

    fn unavailable(&self) -> Result<Vec<Candidate>> {
        Err(ServiceError::Unavailable("connection refused".to_string()).into())
    }
}

#[async_trait]
impl SimilarityBackend for CatalogueBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Service
    }

    async fn find_similar_games(
        &self,
        game_id: i64,
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        _dims: EmbeddingDims,
    ) -> Result<Vec<Candidate>> {
        self.ranking_calls.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push(Call::Similar(game_id, *filters));
        if self.fail {
            return self.unavailable();
        }

        Ok(match self.embedding(game_id) {
            Some(target) => self.rank(target, &[game_id], top_k, distance, filters),
            None => Vec::new(),
        })
    }

    async fn find_games_like(
        &self,
        game_ids: &[i64],
        top_k: usize,
        distance: DistanceType,
        filters: &FilterBounds,
        _dims: EmbeddingDims,
    ) -> Result<Vec<Candidate>> {
        self.ranking_calls.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push(Call::Like(game_ids.to_vec(), *filters));
        if self.fail {
            return self.unavailable();
        }

        let sources: Vec<[f64; 3]> = game_ids.iter().filter_map(|id| self.embedding(*id)).collect();
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let mut centroid = [0.0; 3];
        for source in &sources {
            for (i, v) in source.iter().enumerate() {
                centroid[i] += v / sources.len() as f64;
            }
        }

        Ok(self.rank(centroid, game_ids, top_k, distance, filters))
    }

    async fn game_complexity(&self, game_id: i64) -> Result<Option<f64>> {
        self.calls.lock().unwrap().push(Call::Complexity(game_id));
        Ok(self
            .games
            .iter()
            .find(|g| g.id == game_id)
            .and_then(|g| g.complexity))
    }

    async fn health_check(&self) -> Result<BackendHealth> {
        Ok(BackendHealth {
            backend: BackendKind::Service,
            healthy: !self.fail,
            message: None,
            response_time_ms: 0,
        })
    }
}

fn catalogue() -> Vec<Game> {
    let game = |id, complexity, year, embedding| Game {
        id,
        complexity,
        year,
        embedding,
    };

    vec![
        game(1, Some(2.0), 2005, [1.0, 0.0, 0.0]),
        game(2, Some(2.5), 2010, [0.9, 0.1, 0.0]),
        game(3, Some(3.0), 2015, [0.8, 0.2, 0.1]),
        game(4, Some(3.2), 2018, [0.5, 0.5, 0.2]),
        game(5, Some(3.6), 2020, [0.1, 0.9, 0.3]),
        game(6, Some(4.5), 2012, [0.0, 1.0, 0.0]),
        game(7, None, 2016, [0.7, 0.3, 0.0]),
        game(8, Some(1.5), 2001, [2.0, 0.1, 0.0]),
        game(42, Some(2.8), 2014, [0.85, 0.15, 0.05]),
    ]
}

fn matches(game: &Game, filters: &FilterBounds) -> bool {
    let year_ok = filters.min_year.map_or(true, |min| game.year >= min)
        && filters.max_year.map_or(true, |max| game.year <= max);

    let complexity_ok = match (filters.min_complexity, filters.max_complexity) {
        (None, None) => true,
        (min, max) => game.complexity.map_or(false, |c| {
            min.map_or(true, |min| c >= min) && max.map_or(true, |max| c <= max)
        }),
    };

    year_ok && complexity_ok
}

fn score(distance: DistanceType, a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm = |v: &[f64; 3]| v.iter().map(|x| x * x).sum::<f64>().sqrt();

    match distance {
        DistanceType::Cosine => 1.0 - dot / (norm(a) * norm(b)),
        DistanceType::Euclidean => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt(),
        DistanceType::DotProduct => dot,
    }
}

/// Counts WARN events emitted while installed as the thread's subscriber
#[derive(Clone, Default)]
struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn cached_search(backend: Arc<CatalogueBackend>) -> SimilaritySearch {
    let cache = Arc::new(ResultCache::new(100, Duration::from_secs(60)));
    SimilaritySearch::new(backend, Some(cache))
}

fn ids(results: &[Candidate]) -> Vec<i64> {
    results.iter().map(|c| c.game_id).collect()
}

fn relative(mode: ComplexityMode, band: Option<f64>) -> SimilarityFilters {
    SimilarityFilters {
        complexity_mode: Some(mode),
        complexity_band: band,
        ..SimilarityFilters::default()
    }
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("bound should be set");
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

#[tokio::test]
async fn test_relative_bounds_resolved_before_ranking() {
    let backend = CatalogueBackend::new();
    let search = cached_search(backend.clone());

    let query = SimilarityQuery::new(42)
        .top_k(5)
        .filters(relative(ComplexityMode::WithinBand, Some(0.5)));
    let results = search.find_similar_games(&query).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Call::Complexity(42));
    match &calls[1] {
        Call::Similar(42, bounds) => {
            assert_close(bounds.min_complexity, 2.3);
            assert_close(bounds.max_complexity, 3.3);
        }
        other => panic!("expected ranking call, got {other:?}"),
    }

    assert!(!results.is_empty());
    assert!(results.len() <= 5);
    for game in results.iter() {
        let c = game.complexity.unwrap();
        assert!((2.3 - 1e-9..=3.3 + 1e-9).contains(&c), "complexity {c} out of band");
    }
}

#[tokio::test]
async fn test_repeat_search_served_from_cache() {
    let backend = CatalogueBackend::new();
    let search = cached_search(backend.clone());

    let query = SimilarityQuery::new(42)
        .top_k(3)
        .filters(relative(ComplexityMode::MoreComplex, None));

    let first = search.find_similar_games(&query).await.unwrap();
    let second = search.find_similar_games(&query).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(backend.ranking_calls(), 1);
    assert_eq!(backend.complexity_calls(), 1);
}

#[tokio::test]
async fn test_equivalent_resolutions_share_cache_entry() {
    let backend = CatalogueBackend::new();
    let search = cached_search(backend.clone());

    let relative_query = SimilarityQuery::new(3)
        .top_k(4)
        .filters(relative(ComplexityMode::WithinBand, Some(0.5)));
    let absolute_query = SimilarityQuery::new(3).top_k(4).filters(SimilarityFilters {
        min_complexity: Some(2.5),
        max_complexity: Some(3.5),
        ..SimilarityFilters::default()
    });

    let from_relative = search.find_similar_games(&relative_query).await.unwrap();
    let from_absolute = search.find_similar_games(&absolute_query).await.unwrap();

    assert_eq!(from_relative, from_absolute);
    assert_eq!(backend.ranking_calls(), 1);
}

#[test]
fn test_resolution_is_pure_translation() {
    let resolved = resolver::resolve_with(&relative(ComplexityMode::WithinBand, Some(0.5)), Some(3.0));
    let direct = FilterBounds {
        min_complexity: Some(2.5),
        max_complexity: Some(3.5),
        ..FilterBounds::default()
    };

    assert_eq!(resolved, direct);
    assert_eq!(filter_clause(&resolved), filter_clause(&direct));
}

#[tokio::test]
async fn test_missing_complexity_falls_back_with_one_warning() {
    let backend = CatalogueBackend::new();
    let search = SimilaritySearch::new(backend.clone(), None);

    let counter = WarnCounter::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(counter.clone()));

    let relative_query = SimilarityQuery::new(7)
        .top_k(5)
        .filters(relative(ComplexityMode::LessComplex, Some(1.0)));
    let plain_query = SimilarityQuery::new(7).top_k(5);

    let with_mode = search.find_similar_games(&relative_query).await.unwrap();
    assert_eq!(counter.count(), 1);

    let without_mode = search.find_similar_games(&plain_query).await.unwrap();
    assert_eq!(counter.count(), 1);

    assert_eq!(with_mode, without_mode);
    assert!(!with_mode.is_empty());
}

#[tokio::test]
async fn test_query_game_excluded_without_filters() {
    let search = cached_search(CatalogueBackend::new());

    for game_id in [1, 3, 42] {
        let results = search
            .find_similar_games(&SimilarityQuery::new(game_id).top_k(20))
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(!ids(&results).contains(&game_id));
    }
}

#[tokio::test]
async fn test_source_games_excluded_from_games_like() {
    let backend = CatalogueBackend::new();
    let search = cached_search(backend.clone());

    let results = search
        .find_games_like(&MultiSimilarityQuery::new(vec![2, 1, 2]).top_k(20))
        .await
        .unwrap();

    let result_ids = ids(&results);
    assert!(!result_ids.contains(&1));
    assert!(!result_ids.contains(&2));
    assert_eq!(result_ids.len(), 7);

    // Source ids reach the backend normalized
    assert!(matches!(&backend.calls()[0], Call::Like(ids, _) if ids == &vec![1, 2]));
}

#[tokio::test]
async fn test_games_like_ignores_relative_mode_with_warning() {
    let backend = CatalogueBackend::new();
    let search = SimilaritySearch::new(backend.clone(), None);

    let counter = WarnCounter::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(counter.clone()));

    let query = MultiSimilarityQuery::new(vec![1, 2]).filters(SimilarityFilters {
        min_year: Some(2010),
        ..relative(ComplexityMode::WithinBand, Some(0.5))
    });
    search.find_games_like(&query).await.unwrap();

    assert_eq!(counter.count(), 1);
    assert_eq!(backend.complexity_calls(), 0);
    match &backend.calls()[0] {
        Call::Like(_, bounds) => {
            assert_eq!(bounds.min_year, Some(2010));
            assert_eq!(bounds.min_complexity, None);
            assert_eq!(bounds.max_complexity, None);
        }
        other => panic!("expected games-like call, got {other:?}"),
    }
}

#[tokio::test]
async fn test_metric_direction() {
    let search = cached_search(CatalogueBackend::new());

    for distance in [DistanceType::Cosine, DistanceType::Euclidean] {
        let results = search
            .find_similar_games(&SimilarityQuery::new(42).top_k(8).distance(distance))
            .await
            .unwrap();
        assert!(results.len() > 1);
        assert!(
            results.windows(2).all(|w| w[0].distance <= w[1].distance),
            "{distance} results must be non-decreasing"
        );
    }

    let results = search
        .find_similar_games(
            &SimilarityQuery::new(42)
                .top_k(8)
                .distance(DistanceType::DotProduct),
        )
        .await
        .unwrap();
    assert!(results.windows(2).all(|w| w[0].distance >= w[1].distance));
    assert_eq!(results[0].game_id, 8);
}

#[tokio::test]
async fn test_top_k_caps_results() {
    let search = cached_search(CatalogueBackend::new());

    let results = search
        .find_similar_games(&SimilarityQuery::new(1).top_k(2))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_invalid_requests_rejected_before_backend() {
    let backend = CatalogueBackend::new();
    let search = cached_search(backend.clone());

    let err = search
        .find_similar_games(&SimilarityQuery::new(42).top_k(0))
        .await
        .unwrap_err();
    assert!(matches!(err, SimilarityError::InvalidRequest(_)));

    let err = search
        .find_games_like(&MultiSimilarityQuery::new(Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SimilarityError::InvalidRequest(_)));

    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_game_is_empty_not_error() {
    let search = cached_search(CatalogueBackend::new());

    let results = search
        .find_similar_games(&SimilarityQuery::new(999))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_backend_failure_surfaces_and_is_not_cached() {
    let backend = CatalogueBackend::failing();
    let search = cached_search(backend.clone());

    for _ in 0..2 {
        let err = search
            .find_similar_games(&SimilarityQuery::new(42))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }
    assert_eq!(backend.ranking_calls(), 2);
}

#[tokio::test]
async fn test_clear_cache_forces_recompute() {
    let backend = CatalogueBackend::new();
    let search = cached_search(backend.clone());
    let query = SimilarityQuery::new(42)
        .top_k(3)
        .filters(relative(ComplexityMode::WithinBand, None));

    search.find_similar_games(&query).await.unwrap();
    search.clear_cache().await;
    search.find_similar_games(&query).await.unwrap();

    assert_eq!(backend.ranking_calls(), 2);
    assert_eq!(backend.complexity_calls(), 2);
}

#[tokio::test]
async fn test_uncached_search_always_hits_backend() {
    let backend = CatalogueBackend::new();
    let search = SimilaritySearch::new(backend.clone(), None);
    assert_eq!(search.backend_kind(), BackendKind::Service);

    let query = SimilarityQuery::new(42).top_k(3);
    search.find_similar_games(&query).await.unwrap();
    search.find_similar_games(&query).await.unwrap();
    search.clear_cache().await;

    assert_eq!(backend.ranking_calls(), 2);
}

/// Warehouse whose complexity lookup fails a set number of times before
/// answering; ranking queries always succeed
struct FlakyWarehouse {
    lookup_failures: AtomicUsize,
    lookups: AtomicUsize,
    ranking_sql: Mutex<Vec<String>>,
}

impl FlakyWarehouse {
    fn failing_lookups(times: usize) -> Arc<Self> {
        Arc::new(Self {
            lookup_failures: AtomicUsize::new(times),
            lookups: AtomicUsize::new(0),
            ranking_sql: Mutex::new(Vec::new()),
        })
    }

    fn ranking_sql(&self) -> Vec<String> {
        self.ranking_sql.lock().unwrap().clone()
    }
}

fn warehouse_row(cells: &[(&str, &str)]) -> Row {
    Row(cells
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect::<IndexMap<_, _>>())
}

#[async_trait]
impl Warehouse for FlakyWarehouse {
    async fn query(&self, sql: &str, _params: &[QueryParameter]) -> Result<Vec<Row>> {
        if !sql.contains("ML.DISTANCE") {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let remaining = self.lookup_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.lookup_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(WarehouseError::Api {
                    status: 503,
                    message: "backend error".to_string(),
                }
                .into());
            }
            return Ok(vec![warehouse_row(&[("complexity", "2.8")])]);
        }

        self.ranking_sql.lock().unwrap().push(sql.to_string());
        Ok(vec![
            warehouse_row(&[("game_id", "3"), ("name", "Gamma"), ("complexity", "3.0"), ("distance", "0.1")]),
            warehouse_row(&[("game_id", "4"), ("name", "Delta"), ("complexity", "3.2"), ("distance", "0.3")]),
        ])
    }
}

#[tokio::test]
async fn test_failed_complexity_lookup_is_retried_not_cached() {
    let warehouse = FlakyWarehouse::failing_lookups(1);
    let backend = Arc::new(DirectSimilarityClient::new(
        TableRef::parse("test-project.test_dataset.test_table").unwrap(),
        warehouse.clone(),
    ));
    let search = SimilaritySearch::new(
        backend,
        Some(Arc::new(ResultCache::new(100, Duration::from_secs(3600)))),
    );

    let query = SimilarityQuery::new(42)
        .top_k(5)
        .filters(relative(ComplexityMode::WithinBand, Some(0.5)));

    // Outage: direct soft failure, and nothing ranked without the bound
    let during = search.find_similar_games(&query).await.unwrap();
    assert!(during.is_empty());
    assert!(warehouse.ranking_sql().is_empty());

    let after = search.find_similar_games(&query).await.unwrap();
    assert_eq!(ids(&after), vec![3, 4]);
    assert_eq!(warehouse.lookups.load(Ordering::SeqCst), 2);

    let ranking_sql = warehouse.ranking_sql();
    assert_eq!(ranking_sql.len(), 1);
    assert!(ranking_sql[0].contains("complexity >= 2.3"));
    assert!(ranking_sql[0].contains("complexity <= 3.3"));

    // The recovered complexity and results are cached from here on
    let again = search.find_similar_games(&query).await.unwrap();
    assert_eq!(again, after);
    assert_eq!(warehouse.lookups.load(Ordering::SeqCst), 2);
    assert_eq!(warehouse.ranking_sql().len(), 1);
}
