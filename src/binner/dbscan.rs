//! Density-based clustering of one-dimensional values.
//!
//! Classic DBSCAN over an arbitrary distance function. With `min_points = 1`
//! every point is a core point and clusters are the connected components of
//! the "within epsilon" relation.

use serde::{Deserialize, Serialize};

/// Parameters for [`dbscan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    /// Neighbourhood radius (inclusive).
    pub epsilon: f64,
    /// Points, including itself, a point needs within `epsilon` to be core.
    pub min_points: usize,
}

impl DbscanParams {
    /// Parameters with every point treated as a core point.
    pub fn components(epsilon: f64) -> Self {
        Self {
            epsilon,
            min_points: 1,
        }
    }
}

/// Cluster `values` and return clusters as index lists.
///
/// Clusters are ordered by their first discovered point and indices within a
/// cluster are ascending. Noise points are omitted.
pub fn dbscan<F>(values: &[f64], params: &DbscanParams, metric: F) -> Vec<Vec<usize>>
where
    F: Fn(f64, f64) -> f64,
{
    let region = |i: usize| -> Vec<usize> {
        (0..values.len())
            .filter(|&j| metric(values[i], values[j]) <= params.epsilon)
            .collect()
    };

    let mut visited = vec![false; values.len()];
    let mut assigned = vec![false; values.len()];
    let mut clusters = Vec::new();

    for i in 0..values.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let seeds = region(i);
        if seeds.len() < params.min_points {
            continue;
        }

        let mut members = vec![i];
        assigned[i] = true;
        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if !assigned[j] {
                assigned[j] = true;
                members.push(j);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;
            let around = region(j);
            if around.len() >= params.min_points {
                queue.extend(around.into_iter().filter(|&k| !visited[k] || !assigned[k]));
            }
        }
        members.sort_unstable();
        clusters.push(members);
    }
    clusters
}
