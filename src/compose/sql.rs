//! SQL composition for the direct warehouse backend
//!
//! Only numeric filter values are interpolated into the query text; ids and
//! `top_k` always travel as named query parameters.

use crate::distance::{DistanceType, EmbeddingDims};
use crate::filters::FilterBounds;
use crate::warehouse::TableRef;

pub const GAME_ID_PARAM: &str = "game_id";
pub const GAME_IDS_PARAM: &str = "game_ids";
pub const TOP_K_PARAM: &str = "top_k";

const CANDIDATE_COLUMNS: &str = "game_id, name, year_published, users_rated, \
     average_rating, geek_rating, complexity, thumbnail";

/// One inclusive comparison per set bound.
///
/// Order is fixed (year, users rated, rating, geek rating, complexity; min
/// before max) so identical filters always produce identical text.
pub fn filter_clauses(filters: &FilterBounds) -> Vec<String> {
    let mut clauses = Vec::new();

    push_int(&mut clauses, "year_published", ">=", filters.min_year.map(i64::from));
    push_int(&mut clauses, "year_published", "<=", filters.max_year.map(i64::from));
    push_int(&mut clauses, "users_rated", ">=", filters.min_users_rated);
    push_int(&mut clauses, "users_rated", "<=", filters.max_users_rated);
    push_float(&mut clauses, "average_rating", ">=", filters.min_rating);
    push_float(&mut clauses, "average_rating", "<=", filters.max_rating);
    push_float(&mut clauses, "geek_rating", ">=", filters.min_geek_rating);
    push_float(&mut clauses, "geek_rating", "<=", filters.max_geek_rating);
    push_float(&mut clauses, "complexity", ">=", filters.min_complexity);
    push_float(&mut clauses, "complexity", "<=", filters.max_complexity);

    clauses
}

/// Clauses ready to append to an existing `WHERE`, or `""` when unfiltered
pub fn filter_clause(filters: &FilterBounds) -> String {
    if !filters.has_any_filter() {
        return String::new();
    }

    let clauses = filter_clauses(filters);
    if clauses.is_empty() {
        return String::new();
    }

    format!(" AND {}", clauses.join(" AND "))
}

/// Rank every candidate against one source game's embedding
pub fn similar_games_sql(
    table: &TableRef,
    dims: EmbeddingDims,
    distance: DistanceType,
    filters: &FilterBounds,
) -> String {
    let col = dims.column();
    let filter = filter_clause(filters);

    format!(
        "WITH source_game AS (
    SELECT {col} AS embedding
    FROM `{table}`
    WHERE game_id = @{game_id} AND {col} IS NOT NULL
    LIMIT 1
),
candidates AS (
    SELECT {columns}, {col} AS embedding
    FROM `{table}`
    WHERE game_id != @{game_id} AND {col} IS NOT NULL{filter}
)
SELECT
    c.game_id, c.name, c.year_published, c.users_rated,
    c.average_rating, c.geek_rating, c.complexity, c.thumbnail,
    ML.DISTANCE(c.embedding, s.embedding, '{metric}') AS distance
FROM candidates c
CROSS JOIN source_game s
ORDER BY distance {order}
LIMIT @{top_k}",
        col = col,
        table = table,
        columns = CANDIDATE_COLUMNS,
        game_id = GAME_ID_PARAM,
        filter = filter,
        metric = distance.warehouse_name(),
        order = distance.rank_order().sql_keyword(),
        top_k = TOP_K_PARAM,
    )
}

/// Rank every candidate against the centroid of several source games.
///
/// The centroid is the element-wise mean of the source vectors, built by
/// averaging per array offset and re-aggregating in offset order.
pub fn games_like_sql(
    table: &TableRef,
    dims: EmbeddingDims,
    distance: DistanceType,
    filters: &FilterBounds,
) -> String {
    let col = dims.column();
    let filter = filter_clause(filters);

    format!(
        "WITH source_games AS (
    SELECT {col} AS embedding
    FROM `{table}`
    WHERE game_id IN UNNEST(@{game_ids}) AND {col} IS NOT NULL
),
query_embedding AS (
    SELECT ARRAY_AGG(avg_value ORDER BY pos) AS embedding
    FROM (
        SELECT pos, AVG(value) AS avg_value
        FROM source_games, UNNEST(embedding) AS value WITH OFFSET pos
        GROUP BY pos
    )
),
candidates AS (
    SELECT {columns}, {col} AS embedding
    FROM `{table}`
    WHERE game_id NOT IN UNNEST(@{game_ids}) AND {col} IS NOT NULL{filter}
)
SELECT
    c.game_id, c.name, c.year_published, c.users_rated,
    c.average_rating, c.geek_rating, c.complexity, c.thumbnail,
    ML.DISTANCE(c.embedding, q.embedding, '{metric}') AS distance
FROM candidates c
CROSS JOIN query_embedding q
WHERE q.embedding IS NOT NULL
ORDER BY distance {order}
LIMIT @{top_k}",
        col = col,
        table = table,
        columns = CANDIDATE_COLUMNS,
        game_ids = GAME_IDS_PARAM,
        filter = filter,
        metric = distance.warehouse_name(),
        order = distance.rank_order().sql_keyword(),
        top_k = TOP_K_PARAM,
    )
}

/// Scalar complexity lookup for relative filter resolution
pub fn complexity_sql(table: &TableRef) -> String {
    format!(
        "SELECT complexity FROM `{}` WHERE game_id = @{} LIMIT 1",
        table, GAME_ID_PARAM
    )
}

fn push_int(clauses: &mut Vec<String>, column: &str, op: &str, value: Option<i64>) {
    if let Some(v) = value {
        clauses.push(format!("{} {} {}", column, op, v));
    }
}

fn push_float(clauses: &mut Vec<String>, column: &str, op: &str, value: Option<f64>) {
    // NaN/inf have no SQL literal; treat them as unset
    if let Some(v) = value.filter(|v| v.is_finite()) {
        clauses.push(format!("{} {} {}", column, op, v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableRef {
        TableRef::parse("test-project.test_dataset.test_table").unwrap()
    }

    #[test]
    fn test_filter_clause_empty() {
        assert_eq!(filter_clause(&FilterBounds::default()), "");
        assert!(filter_clauses(&FilterBounds::default()).is_empty());
    }

    #[test]
    fn test_filter_clause_order() {
        let filters = FilterBounds {
            min_complexity: Some(2.5),
            max_year: Some(2024),
            min_year: Some(2000),
            min_geek_rating: Some(6.5),
            min_users_rated: Some(100),
            max_rating: Some(9.0),
            ..FilterBounds::default()
        };
        assert_eq!(
            filter_clauses(&filters),
            vec![
                "year_published >= 2000",
                "year_published <= 2024",
                "users_rated >= 100",
                "average_rating <= 9",
                "geek_rating >= 6.5",
                "complexity >= 2.5",
            ]
        );
        assert!(filter_clause(&filters).starts_with(" AND year_published >= 2000 AND "));
    }

    #[test]
    fn test_non_finite_bounds_are_skipped() {
        let filters = FilterBounds {
            min_rating: Some(f64::NAN),
            ..FilterBounds::default()
        };
        assert_eq!(filter_clause(&filters), "");
    }

    #[test]
    fn test_similar_games_sql() {
        let filters = FilterBounds {
            min_year: Some(2010),
            ..FilterBounds::default()
        };
        let sql = similar_games_sql(&table(), EmbeddingDims::D16, DistanceType::Cosine, &filters);
        assert!(sql.contains("ML.DISTANCE(c.embedding, s.embedding, 'COSINE')"));
        assert!(sql.contains("game_id = @game_id"));
        assert!(sql.contains("WHERE game_id != @game_id AND embedding_16 IS NOT NULL AND year_published >= 2010"));
        assert!(sql.contains("`test-project.test_dataset.test_table`"));
        assert!(sql.contains("ORDER BY distance ASC"));
        assert!(sql.ends_with("LIMIT @top_k"));
    }

    #[test]
    fn test_dot_product_sorts_descending() {
        let sql = similar_games_sql(
            &table(),
            EmbeddingDims::D64,
            DistanceType::DotProduct,
            &FilterBounds::default(),
        );
        assert!(sql.contains("'DOT_PRODUCT'"));
        assert!(sql.contains("ORDER BY distance DESC"));
        assert!(sql.contains("SELECT embedding AS embedding"));
    }

    #[test]
    fn test_games_like_sql_uses_centroid_and_excludes_sources() {
        let sql = games_like_sql(
            &table(),
            EmbeddingDims::D8,
            DistanceType::Euclidean,
            &FilterBounds::default(),
        );
        assert!(sql.contains("WHERE game_id IN UNNEST(@game_ids)"));
        assert!(sql.contains("WHERE game_id NOT IN UNNEST(@game_ids)"));
        assert!(sql.contains("AVG(value) AS avg_value"));
        assert!(sql.contains("UNNEST(embedding) AS value WITH OFFSET pos"));
        assert!(sql.contains("ARRAY_AGG(avg_value ORDER BY pos)"));
        assert!(sql.contains("'EUCLIDEAN'"));
    }

    #[test]
    fn test_complexity_sql() {
        assert_eq!(
            complexity_sql(&table()),
            "SELECT complexity FROM `test-project.test_dataset.test_table` WHERE game_id = @game_id LIMIT 1"
        );
    }
}
