use std::cmp::Ordering;

pub mod metrics;
pub mod validation;

/// Descending order for scores, with NaN ranked after every number.
pub fn compare_scores_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Indices of the `k` highest scores, best first. Ties keep index order.
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indexed_scores: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();

    indexed_scores.sort_by(|a, b| compare_scores_desc(a.1, b.1));

    indexed_scores
        .into_iter()
        .take(k)
        .map(|(i, _)| i)
        .collect()
}

pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
