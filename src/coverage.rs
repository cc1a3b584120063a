//! Edge coverage estimation by flow balance.
//!
//! Every vertex side should carry, summed over its edges, the vertex's own
//! coverage. The estimator starts from a degree-split guess and then applies
//! corrections to all edges at once until every relative correction drops
//! below epsilon or the iteration cap is reached.
//!
//! Each endpoint's residual is weighted by `len * degree / 2`, so long and
//! well-connected vertices pull harder on the edges they share.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CoverageConfig;
use crate::store::GraphStore;
use crate::types::EdgeKey;

/// Outcome of a refinement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// All relative corrections fell below epsilon.
    pub converged: bool,
    /// Refinement iterations performed.
    pub iterations: usize,
    /// Largest relative correction of the last iteration.
    pub max_relative_correction: f64,
    /// Edges estimated.
    pub edges: usize,
}

/// Per-edge view of the two vertex sides it joins.
struct EdgeSlot {
    key: EdgeKey,
    len0: f64,
    cov0: f64,
    side0: usize,
    len1: f64,
    cov1: f64,
    side1: usize,
    weight0: f64,
    weight1: f64,
}

/// Sides of every vertex and the edges attached to them.
struct FlowSystem {
    slots: Vec<EdgeSlot>,
    sides: Vec<Vec<usize>>,
}

impl FlowSystem {
    fn build(graph: &GraphStore) -> Self {
        let index: BTreeMap<&EdgeKey, usize> = graph
            .edges()
            .enumerate()
            .map(|(i, e)| (&e.key, i))
            .collect();

        let mut side_ids: BTreeMap<(&str, bool), usize> = BTreeMap::new();
        let mut sides: Vec<Vec<usize>> = Vec::new();
        for vertex in graph.vertices() {
            for view in graph.views(&vertex.label) {
                let id = side_id(&mut side_ids, &mut sides, view.from, view.from_dir);
                if let Some(&i) = index.get(view.key) {
                    sides[id].push(i);
                }
            }
        }

        let mut slots = Vec::with_capacity(index.len());
        for edge in graph.edges() {
            let key = &edge.key;
            let (len0, cov0) = graph
                .get_vertex(&key.one)
                .map_or((0.0, 0.0), |v| (v.len() as f64, v.coverage));
            let (len1, cov1) = graph
                .get_vertex(&key.two)
                .map_or((0.0, 0.0), |v| (v.len() as f64, v.coverage));
            let weight0 = len0 * graph.degree(&key.one) as f64 / 2.0;
            let weight1 = len1 * graph.degree(&key.two) as f64 / 2.0;
            let side0 = side_id(&mut side_ids, &mut sides, &key.one, key.d_one);
            let side1 = side_id(&mut side_ids, &mut sides, &key.two, !key.d_two);
            let (len0, len1) = if len0 + len1 > 0.0 { (len0, len1) } else { (1.0, 1.0) };
            let (weight0, weight1) = if weight0 + weight1 > 0.0 { (weight0, weight1) } else { (1.0, 1.0) };
            slots.push(EdgeSlot {
                key: key.clone(),
                len0,
                cov0,
                side0,
                len1,
                cov1,
                side1,
                weight0,
                weight1,
            });
        }
        Self { slots, sides }
    }

    fn degree(&self, side: usize) -> f64 {
        self.sides[side].len().max(1) as f64
    }

    fn side_sum(&self, side: usize, values: &[f64]) -> f64 {
        self.sides[side]
            .iter()
            .map(|&i| usable(values[i]))
            .sum()
    }
}

fn side_id<'g>(
    ids: &mut BTreeMap<(&'g str, bool), usize>,
    sides: &mut Vec<Vec<usize>>,
    label: &'g str,
    side: bool,
) -> usize {
    *ids.entry((label, side)).or_insert_with(|| {
        sides.push(Vec::new());
        sides.len() - 1
    })
}

fn usable(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        1.0
    }
}

/// Fixed-point estimator of edge coverage.
#[derive(Debug, Clone)]
pub struct CoverageEstimator {
    config: CoverageConfig,
}

impl CoverageEstimator {
    /// Create an estimator.
    pub fn new(config: CoverageConfig) -> Self {
        Self { config }
    }

    /// Initial guess followed by refinement. Writes edge coverage into the store.
    pub fn estimate(&self, graph: &mut GraphStore) -> CoverageReport {
        let system = FlowSystem::build(graph);
        let mut values: Vec<f64> = system
            .slots
            .iter()
            .map(|s| {
                (s.len0 * s.cov0 / system.degree(s.side0) + s.len1 * s.cov1 / system.degree(s.side1))
                    / (s.len0 + s.len1)
            })
            .collect();

        let report = self.refine(&system, &mut values);
        for (slot, value) in system.slots.iter().zip(&values) {
            if let Some(edge) = graph.edge_mut(&slot.key) {
                edge.coverage = Some(*value);
            }
        }

        if report.converged {
            debug!(iterations = report.iterations, edges = report.edges, "coverage converged");
        } else {
            warn!(
                iterations = report.iterations,
                max_relative_correction = report.max_relative_correction,
                "coverage estimation did not converge"
            );
        }
        report
    }

    fn refine(&self, system: &FlowSystem, values: &mut [f64]) -> CoverageReport {
        let mut report = CoverageReport {
            converged: system.slots.is_empty(),
            iterations: 0,
            max_relative_correction: 0.0,
            edges: system.slots.len(),
        };
        if report.converged {
            return report;
        }

        let mut corrections = vec![0.0; values.len()];
        for iteration in 1..=self.config.max_iterations {
            let mut converged = true;
            let mut worst: f64 = 0.0;
            for (i, slot) in system.slots.iter().enumerate() {
                let r0 = system.side_sum(slot.side0, values) - slot.cov0;
                let r1 = system.side_sum(slot.side1, values) - slot.cov1;
                let correction = 0.5 * (slot.weight0 * r0 + slot.weight1 * r1) / (slot.weight0 + slot.weight1);
                corrections[i] = correction;

                let current = usable(values[i]);
                let relative = if current.abs() > f64::EPSILON {
                    (correction / current).abs()
                } else {
                    correction.abs()
                };
                worst = worst.max(relative);
                if relative >= self.config.epsilon {
                    converged = false;
                }
            }
            for (value, correction) in values.iter_mut().zip(&corrections) {
                *value = (usable(*value) - correction).max(0.0);
            }

            report.iterations = iteration;
            report.max_relative_correction = worst;
            if converged {
                report.converged = true;
                break;
            }
        }
        report
    }
}

/// Sum of estimated coverage over the edges on one side of a vertex.
///
/// Edges without an estimate count as zero.
pub fn side_coverage(graph: &GraphStore, label: &str, side: bool) -> f64 {
    graph
        .side_views(label, side)
        .iter()
        .filter_map(|v| graph.edge(v.key).and_then(|e| e.coverage))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vertex;

    fn add(g: &mut GraphStore, label: &str, cov: f64) {
        g.add_vertex(Vertex::new(label).with_sequence("G".repeat(100)).with_coverage(cov), false);
    }

    #[test]
    fn test_parallel_edges_balance() {
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 10.0);
        add(&mut g, "b", 20.0);
        g.add_edge("a", "b", true, false).unwrap();
        g.add_edge("b", "a", true, false).unwrap();

        let config = CoverageConfig::default();
        let report = CoverageEstimator::new(config.clone()).estimate(&mut g);
        assert!(report.converged);
        for label in ["a", "b"] {
            let inflow = side_coverage(&g, label, false);
            let outflow = side_coverage(&g, label, true);
            assert!((inflow - outflow).abs() <= config.epsilon, "{label}: {inflow} vs {outflow}");
        }
    }

    #[test]
    fn test_branch_converges_to_fixed_point() {
        // a (degree 2) weighs twice as much as b or c: 0.5 * (100 * (2x - 10) + 50 * (x - 10)) = 0 at x = 6.
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 10.0);
        add(&mut g, "b", 10.0);
        add(&mut g, "c", 10.0);
        g.add_edge("a", "b", true, false).unwrap();
        g.add_edge("a", "c", true, false).unwrap();

        let report = CoverageEstimator::new(CoverageConfig::default()).estimate(&mut g);
        assert!(report.converged);
        assert_eq!(report.iterations, 3);
        for edge in g.edges() {
            let cov = edge.coverage.unwrap();
            assert!((cov - 6.0).abs() < 0.01, "{cov}");
        }
    }

    #[test]
    fn test_iteration_cap_reports_nonconvergence() {
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 10.0);
        add(&mut g, "b", 10.0);
        add(&mut g, "c", 10.0);
        g.add_edge("a", "b", true, false).unwrap();
        g.add_edge("a", "c", true, false).unwrap();

        let config = CoverageConfig {
            max_iterations: 2,
            ..CoverageConfig::default()
        };
        let report = CoverageEstimator::new(config).estimate(&mut g);
        assert!(!report.converged);
        assert_eq!(report.iterations, 2);
        assert!(g.edges().all(|e| e.coverage.is_some()));
    }

    #[test]
    fn test_vertex_coverage_untouched() {
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 12.0);
        add(&mut g, "b", 4.0);
        g.add_edge("a", "b", true, true).unwrap();
        CoverageEstimator::new(CoverageConfig::default()).estimate(&mut g);
        assert_eq!(g.get_vertex("a").unwrap().coverage, 12.0);
        assert_eq!(g.get_vertex("b").unwrap().coverage, 4.0);
        assert!((g.edges().next().unwrap().coverage.unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_graph_converges() {
        let mut g = GraphStore::new(3);
        let report = CoverageEstimator::new(CoverageConfig::default()).estimate(&mut g);
        assert!(report.converged);
        assert_eq!(report.iterations, 0);
    }
}
