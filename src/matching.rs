//! Fuzzy name matching for reconciling restaurants and menu items across sources.
//!
//! Scores are in `0.0..=1.0`. Both measures operate on normalized names, so
//! case, punctuation and trademark noise never affect a score.

use std::collections::HashSet;

use crate::normalize::{normalize_name, tokens};

/// Minimum similarity for two menu item names to be treated as the same item.
pub const ITEM_MATCH_THRESHOLD: f64 = 0.85;

/// Minimum similarity for two restaurant names to be treated as the same venue.
pub const RESTAURANT_MATCH_THRESHOLD: f64 = 0.80;

/// A candidate that matched a query, with its position in the candidate list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Index into the candidate slice passed to [`best_match`].
    pub index: usize,
    /// Similarity score of the match.
    pub score: f64,
}

/// Edit-distance similarity on normalized names.
#[must_use]
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize_name(a), &normalize_name(b))
}

/// Jaccard index of the normalized token sets; 0 when either side has no tokens.
#[must_use]
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let left: HashSet<String> = tokens(a).into_iter().collect();
    let right: HashSet<String> = tokens(b).into_iter().collect();
    jaccard(&left, &right)
}

/// Jaccard index of two sets; 0 when either is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard<T: Eq + std::hash::Hash>(left: &HashSet<T>, right: &HashSet<T>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(right).count();
    let union = left.union(right).count();
    shared as f64 / union as f64
}

/// Combined similarity between two names.
///
/// Equal keys score 1.0, an empty key scores 0.0, otherwise the better of
/// edit-distance similarity and token overlap. Token overlap catches reordered
/// names ("Cheese Pizza Slice" / "Slice Cheese Pizza") that edit distance
/// punishes.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let left = normalize_name(a);
    let right = normalize_name(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }

    let edit = strsim::normalized_levenshtein(&left, &right);
    let overlap = token_overlap(&left, &right);
    edit.max(overlap)
}

/// Finds the best-scoring candidate at or above `threshold`.
///
/// Ties keep the earliest candidate.
#[must_use]
pub fn best_match<S: AsRef<str>>(query: &str, candidates: &[S], threshold: f64) -> Option<Match> {
    let mut best: Option<Match> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let score = similarity(query, candidate.as_ref());
        if score < threshold {
            continue;
        }
        if best.is_none_or(|current| score > current.score) {
            best = Some(Match { index, score });
        }
    }
    best
}

/// Groups names into clusters of mutually-similar entries.
///
/// Each name joins the first cluster whose pivot (first member) scores at or
/// above `threshold`; otherwise it starts a new cluster. Returns indices into
/// `names`, in input order within each cluster.
#[must_use]
pub fn cluster_by_name<S: AsRef<str>>(names: &[S], threshold: f64) -> Vec<Vec<usize>> {
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for (index, name) in names.iter().enumerate() {
        let placed = clusters.iter_mut().find(|cluster| {
            cluster
                .first()
                .is_some_and(|&pivot| similarity(names[pivot].as_ref(), name.as_ref()) >= threshold)
        });
        match placed {
            Some(cluster) => cluster.push(index),
            None => clusters.push(vec![index]),
        }
    }
    clusters
}
