//! Final ranking pass applied to every backend's output

use super::models::Candidate;
use crate::distance::{DistanceType, RankOrder};
use std::cmp::Ordering;
use tracing::debug;

/// Enforce the ranking contract on a raw candidate list.
///
/// Drops excluded ids (the query or source games) and rows with a
/// non-finite distance, sorts by the metric's direction and keeps at most
/// `top_k` rows. The sort is stable so ties keep backend order.
pub fn rank_candidates(
    mut candidates: Vec<Candidate>,
    excluded: &[i64],
    distance: DistanceType,
    top_k: usize,
) -> Vec<Candidate> {
    let before = candidates.len();
    candidates.retain(|c| !excluded.contains(&c.game_id) && c.distance.is_finite());
    if candidates.len() != before {
        debug!("Dropped {} excluded or unscored candidates", before - candidates.len());
    }

    match distance.rank_order() {
        RankOrder::Ascending => candidates.sort_by(|a, b| compare(a.distance, b.distance)),
        RankOrder::Descending => candidates.sort_by(|a, b| compare(b.distance, a.distance)),
    }

    candidates.truncate(top_k);
    candidates
}

fn compare(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(game_id: i64, distance: f64) -> Candidate {
        Candidate {
            game_id,
            name: format!("Game {}", game_id),
            year_published: None,
            users_rated: None,
            average_rating: None,
            geek_rating: None,
            complexity: None,
            thumbnail: None,
            distance,
        }
    }

    #[test]
    fn test_ascending_for_cosine() {
        let ranked = rank_candidates(
            vec![candidate(1, 0.3), candidate(2, 0.1), candidate(3, 0.2)],
            &[],
            DistanceType::Cosine,
            10,
        );
        let ids: Vec<i64> = ranked.iter().map(|c| c.game_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_descending_for_dot_product() {
        let ranked = rank_candidates(
            vec![candidate(1, 0.3), candidate(2, 4.5), candidate(3, 1.2)],
            &[],
            DistanceType::DotProduct,
            2,
        );
        let ids: Vec<i64> = ranked.iter().map(|c| c.game_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_excludes_query_games_and_nan() {
        let ranked = rank_candidates(
            vec![candidate(42, 0.0), candidate(7, f64::NAN), candidate(8, 0.4), candidate(9, 0.2)],
            &[42, 9],
            DistanceType::Euclidean,
            10,
        );
        let ids: Vec<i64> = ranked.iter().map(|c| c.game_id).collect();
        assert_eq!(ids, vec![8]);
    }
}
