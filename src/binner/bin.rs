//! Coverage bins.

use serde::{Deserialize, Serialize};

use crate::types::Vertex;

/// Smallest coverage the metric accepts; lower values are clamped.
pub const MIN_METRIC_COVERAGE: f64 = 1e-6;

/// Distance between two coverage depths.
///
/// `0.5 * (a - b) * (ln a - ln b)`: symmetric, zero on equal depths and
/// growing faster for differences between deep values than shallow ones.
pub fn coverage_metric(a: f64, b: f64) -> f64 {
    let a = a.max(MIN_METRIC_COVERAGE);
    let b = b.max(MIN_METRIC_COVERAGE);
    0.5 * (a - b) * (a.ln() - b.ln())
}

/// A population of vertices sharing a coverage depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    /// Bin id, unique within one binning run.
    pub id: u32,
    /// Length-weighted mean coverage of the members.
    pub est_cov: f64,
    /// Summed member length.
    pub tot_len: u64,
    /// Member vertex labels in insertion order.
    pub members: Vec<String>,
}

impl Bin {
    /// Empty bin.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            est_cov: 0.0,
            tot_len: 0,
            members: Vec::new(),
        }
    }

    /// Add a vertex, updating the running mean. Returns `false` if already a member.
    pub fn add_member(&mut self, vertex: &Vertex) -> bool {
        if self.contains(&vertex.label) {
            return false;
        }
        let len = vertex.len() as u64;
        let total = self.tot_len + len;
        if total > 0 {
            self.est_cov = (self.est_cov * self.tot_len as f64 + vertex.coverage * len as f64) / total as f64;
        }
        self.tot_len = total;
        self.members.push(vertex.label.clone());
        true
    }

    /// Remove a vertex, reversing its contribution. Returns `false` if absent.
    pub fn remove_member(&mut self, vertex: &Vertex) -> bool {
        let Some(pos) = self.members.iter().position(|m| m == &vertex.label) else {
            return false;
        };
        self.members.remove(pos);
        let len = vertex.len() as u64;
        let total = self.tot_len.saturating_sub(len);
        self.est_cov = if total > 0 {
            (self.est_cov * self.tot_len as f64 - vertex.coverage * len as f64) / total as f64
        } else {
            0.0
        };
        self.tot_len = total;
        true
    }

    /// Label is a member.
    pub fn contains(&self, label: &str) -> bool {
        self.members.iter().any(|m| m == label)
    }

    /// No members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Coverage distance from this bin's depth.
    pub fn distance_to(&self, coverage: f64) -> f64 {
        coverage_metric(self.est_cov, coverage)
    }
}

impl std::fmt::Display for Bin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B-{}(cov={:.2} totLen={})", self.id, self.est_cov, self.tot_len)
    }
}
