//! Coverage binning of vertices and propagation of bins onto edges.
//!
//! # Phases
//!
//! 1. **Clustering**: long vertices are clustered by coverage with
//!    [`dbscan`] under [`coverage_metric`]. Structurally simple members of
//!    each cluster form a [`Bin`].
//! 2. **Seeding**: every edge touching a binned vertex inherits that bin
//!    with multiplicity one.
//! 3. **Propagation**: an unresolved edge that is the only unknown edge on
//!    its side of a vertex is forced to carry the flow balance of that vertex
//!    (opposite-side total minus same-side resolved total). Both endpoints
//!    must agree, otherwise the edge is flagged as a conflict.
//! 4. **Fallback**: when propagation stalls, the closest unresolved edge to
//!    the most significant bin is assigned to it and propagation resumes.

pub mod bin;
pub mod dbscan;
pub mod multiplicity;

pub use bin::{coverage_metric, Bin};
pub use dbscan::{dbscan, DbscanParams};
pub use multiplicity::Multiplicity;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BinningConfig;
use crate::store::GraphStore;
use crate::types::EdgeKey;

/// Result of one binning run.
#[derive(Debug, Clone, PartialEq)]
pub struct BinningOutcome {
    /// Bins in id order.
    pub bins: Vec<Bin>,
    /// Resolved edges and their per-bin multiplicity.
    pub edge_bins: BTreeMap<EdgeKey, Multiplicity>,
    /// Edges left without an assignment.
    pub unresolved: Vec<EdgeKey>,
    /// Unresolved edges whose endpoints disagreed.
    pub conflicts: Vec<EdgeKey>,
    /// Edges assigned by coverage distance rather than propagation.
    pub fallback_assignments: usize,
}

impl BinningOutcome {
    /// Bin containing `label`, if any.
    pub fn bin_of(&self, label: &str) -> Option<&Bin> {
        self.bins.iter().find(|b| b.contains(label))
    }

    /// Serializable view with edges rendered as text.
    pub fn summary(&self) -> BinningSummary {
        BinningSummary {
            bins: self.bins.clone(),
            assignments: self
                .edge_bins
                .iter()
                .map(|(key, m)| EdgeAssignment {
                    edge: key.to_string(),
                    copies: m.total(),
                    expected_coverage: m.coverage(&self.bins),
                    multiplicity: m.clone(),
                })
                .collect(),
            unresolved: self.unresolved.iter().map(ToString::to_string).collect(),
            conflicts: self.conflicts.iter().map(ToString::to_string).collect(),
            fallback_assignments: self.fallback_assignments,
        }
    }
}

/// One resolved edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAssignment {
    /// Edge id, e.g. `1+,2-`.
    pub edge: String,
    /// Copies per bin.
    pub multiplicity: Multiplicity,
    /// Copies over all bins.
    pub copies: u32,
    /// Depth implied by the copies, from the bins' estimated coverage.
    pub expected_coverage: f64,
}

/// Wire form of a [`BinningOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningSummary {
    /// Bins in id order.
    pub bins: Vec<Bin>,
    /// Resolved edges.
    pub assignments: Vec<EdgeAssignment>,
    /// Unresolved edge ids.
    pub unresolved: Vec<String>,
    /// Conflicting edge ids.
    pub conflicts: Vec<String>,
    /// Edges assigned by coverage distance.
    pub fallback_assignments: usize,
}

/// Coverage binner.
#[derive(Debug, Clone)]
pub struct Binner {
    config: BinningConfig,
}

impl Binner {
    /// Create a binner.
    pub fn new(config: BinningConfig) -> Self {
        Self { config }
    }

    /// Cluster significant vertices into bins. Ids start at 1.
    pub fn cluster(&self, graph: &GraphStore) -> Vec<Bin> {
        let significant: Vec<_> = graph
            .vertices()
            .filter(|v| v.len() > self.config.significance_length)
            .collect();
        let values: Vec<f64> = significant.iter().map(|v| v.coverage).collect();
        let clusters = dbscan(
            &values,
            &DbscanParams::components(self.config.cluster_epsilon),
            coverage_metric,
        );

        let mut bins = Vec::new();
        let mut next_id = 1;
        for cluster in clusters {
            let mut bin = Bin::new(next_id);
            for idx in cluster {
                let vertex = significant[idx];
                if graph.degree(&vertex.label) <= self.config.max_member_degree {
                    bin.add_member(vertex);
                } else {
                    debug!(vertex = %vertex.label, "ambiguous vertex left out of bin");
                }
            }
            if !bin.is_empty() {
                next_id += 1;
                bins.push(bin);
            }
        }
        bins
    }

    /// Cluster, then assign bins to as many edges as the graph determines.
    pub fn run(&self, graph: &GraphStore) -> BinningOutcome {
        let bins = self.cluster(graph);
        let mut state = Propagation {
            graph,
            assigned: BTreeMap::new(),
            conflicts: BTreeSet::new(),
        };
        let mut pending = state.seed(&bins);

        let mut by_significance: Vec<&Bin> = bins.iter().collect();
        by_significance.sort_by(|a, b| b.tot_len.cmp(&a.tot_len));

        let mut fallback_assignments = 0;
        loop {
            while state.resolve_pass(&mut pending) > 0 {}
            match self.closest_match(graph, &by_significance, &pending, &state.conflicts) {
                Some((idx, bin)) => {
                    let key = pending.remove(idx);
                    debug!(edge = %key, bin, "edge assigned by coverage distance");
                    state.assigned.insert(key, Multiplicity::single(bin, 1));
                    fallback_assignments += 1;
                }
                None => break,
            }
        }

        let conflicts: Vec<EdgeKey> = pending
            .iter()
            .filter(|k| state.conflicts.contains(*k))
            .cloned()
            .collect();
        info!(
            target: "hybrid_graph_kernel::metrics",
            bins = bins.len(),
            resolved = state.assigned.len(),
            unresolved = pending.len(),
            conflicts = conflicts.len(),
            fallback_assignments,
            "binning complete"
        );

        BinningOutcome {
            bins,
            edge_bins: state.assigned,
            unresolved: pending,
            conflicts,
            fallback_assignments,
        }
    }

    /// Pending edge nearest the most significant bin that has any candidate.
    fn closest_match(
        &self,
        graph: &GraphStore,
        bins: &[&Bin],
        pending: &[EdgeKey],
        conflicts: &BTreeSet<EdgeKey>,
    ) -> Option<(usize, u32)> {
        for bin in bins {
            let best = pending
                .iter()
                .enumerate()
                .filter(|(_, key)| !conflicts.contains(*key))
                .filter_map(|(i, key)| {
                    let coverage = graph.edge(key)?.coverage?;
                    Some((i, bin.distance_to(coverage)))
                })
                .filter(|(_, d)| *d <= self.config.cluster_epsilon)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((i, _)) = best {
                return Some((i, bin.id));
            }
        }
        None
    }
}

struct Propagation<'g> {
    graph: &'g GraphStore,
    assigned: BTreeMap<EdgeKey, Multiplicity>,
    conflicts: BTreeSet<EdgeKey>,
}

impl Propagation<'_> {
    /// Assign edges touching binned vertices; return the rest.
    fn seed(&mut self, bins: &[Bin]) -> Vec<EdgeKey> {
        let membership: BTreeMap<&str, u32> = bins
            .iter()
            .flat_map(|b| b.members.iter().map(move |m| (m.as_str(), b.id)))
            .collect();

        let mut pending = Vec::new();
        for edge in self.graph.edges() {
            let key = &edge.key;
            let one = membership.get(key.one.as_str()).copied();
            let two = membership.get(key.two.as_str()).copied();
            match (one, two) {
                (Some(x), Some(y)) if x != y => {
                    warn!(edge = %key, left = x, right = y, "edge joins two bins");
                    self.conflicts.insert(key.clone());
                    pending.push(key.clone());
                }
                (Some(bin), _) | (_, Some(bin)) => {
                    self.assigned.insert(key.clone(), Multiplicity::single(bin, 1));
                }
                (None, None) => pending.push(key.clone()),
            }
        }
        pending
    }

    /// Resolved total and unknown count over one side of a vertex.
    fn side_state(&self, label: &str, side: bool) -> (Multiplicity, usize) {
        let mut total = Multiplicity::new();
        let mut unknown = 0;
        for view in self.graph.side_views(label, side) {
            match self.assigned.get(view.key) {
                Some(m) => total.add(m),
                None => unknown += 1,
            }
        }
        (total, unknown)
    }

    /// Multiplicity forced on the single unknown edge of `(label, side)`.
    fn forced(&self, label: &str, side: bool) -> Option<Multiplicity> {
        let (same, same_unknown) = self.side_state(label, side);
        if same_unknown != 1 {
            return None;
        }
        let (opposite, opposite_unknown) = self.side_state(label, !side);
        if opposite_unknown != 0 {
            return None;
        }
        let Some(forced) = opposite.checked_sub(&same) else {
            debug!(vertex = label, "side already over-assigned");
            return None;
        };
        (!forced.is_empty()).then_some(forced)
    }

    /// One sweep over `pending`; returns the number of edges resolved.
    fn resolve_pass(&mut self, pending: &mut Vec<EdgeKey>) -> usize {
        let mut resolved = 0;
        let mut still = Vec::with_capacity(pending.len());
        for key in pending.drain(..) {
            let left = self.forced(&key.one, key.d_one);
            let right = self.forced(&key.two, !key.d_two);
            let result = match (left, right) {
                (None, None) => None,
                (Some(m), None) | (None, Some(m)) => Some(m),
                (Some(a), Some(b)) if a == b => Some(a),
                (Some(a), Some(b)) => {
                    warn!(edge = %key, left = %a, right = %b, "conflicting bin propagation");
                    self.conflicts.insert(key.clone());
                    None
                }
            };
            match result {
                Some(m) => {
                    self.conflicts.remove(&key);
                    self.assigned.insert(key, m);
                    resolved += 1;
                }
                None => still.push(key),
            }
        }
        *pending = still;
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vertex;

    fn add(g: &mut GraphStore, label: &str, len: usize, cov: f64) {
        g.add_vertex(Vertex::new(label).with_sequence("A".repeat(len)).with_coverage(cov), false);
    }

    #[test]
    fn test_two_populations_form_two_bins() {
        let mut g = GraphStore::new(127);
        add(&mut g, "1", 20_000, 5.0);
        add(&mut g, "2", 30_000, 5.0);
        add(&mut g, "3", 40_000, 5.0);
        add(&mut g, "4", 15_000, 40.0);
        add(&mut g, "5", 25_000, 40.0);
        add(&mut g, "6", 500, 40.0);

        let bins = Binner::new(BinningConfig::default()).cluster(&g);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].id, 1);
        assert!((bins[0].est_cov - 5.0).abs() < 1e-9);
        assert_eq!(bins[0].tot_len, 90_000);
        assert_eq!(bins[1].id, 2);
        assert!((bins[1].est_cov - 40.0).abs() < 1e-9);
        assert_eq!(bins[1].tot_len, 40_000);
        assert!(!bins[1].contains("6"));
    }

    #[test]
    fn test_branching_vertex_excluded() {
        let mut g = GraphStore::new(3);
        add(&mut g, "hub", 20_000, 10.0);
        for leaf in ["p", "q", "r"] {
            add(&mut g, leaf, 100, 10.0);
            g.add_edge("hub", leaf, true, false).unwrap();
        }
        let bins = Binner::new(BinningConfig::default()).cluster(&g);
        assert!(bins.is_empty());
    }

    /// a -> x -> r, c -> r, r -> b, r -> d with a, b in bin 1 and c, d in bin 2.
    fn repeat_graph() -> GraphStore {
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 20_000, 10.0);
        add(&mut g, "b", 20_000, 10.0);
        add(&mut g, "c", 20_000, 25.0);
        add(&mut g, "d", 20_000, 25.0);
        add(&mut g, "x", 500, 10.0);
        add(&mut g, "r", 500, 35.0);
        g.add_edge("a", "x", true, false).unwrap();
        g.add_edge("x", "r", true, false).unwrap();
        g.add_edge("c", "r", true, false).unwrap();
        g.add_edge("r", "b", true, false).unwrap();
        g.add_edge("r", "d", true, false).unwrap();
        g
    }

    #[test]
    fn test_flow_balance_resolves_edge_into_repeat() {
        let g = repeat_graph();
        let outcome = Binner::new(BinningConfig::default()).run(&g);

        assert_eq!(outcome.bins.len(), 2);
        assert!(outcome.unresolved.is_empty());
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.fallback_assignments, 0);

        let key = EdgeKey::new("x", true, "r", true);
        assert_eq!(outcome.edge_bins[&key], Multiplicity::single(1, 1));
        let key = EdgeKey::new("c", true, "r", true);
        assert_eq!(outcome.edge_bins[&key], Multiplicity::single(2, 1));
        assert_eq!(outcome.bin_of("a").map(|b| b.id), Some(1));
    }

    #[test]
    fn test_disagreeing_endpoints_leave_conflict() {
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 20_000, 10.0);
        add(&mut g, "c", 20_000, 25.0);
        add(&mut g, "x", 500, 10.0);
        add(&mut g, "y", 500, 25.0);
        g.add_edge("a", "x", true, false).unwrap();
        g.add_edge("x", "y", true, false).unwrap();
        g.add_edge("y", "c", true, false).unwrap();

        let outcome = Binner::new(BinningConfig::default()).run(&g);
        let key = EdgeKey::new("x", true, "y", true);
        assert_eq!(outcome.unresolved, vec![key.clone()]);
        assert_eq!(outcome.conflicts, vec![key.clone()]);
        assert!(!outcome.edge_bins.contains_key(&key));
    }

    #[test]
    fn test_edge_between_bins_is_conflict() {
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 20_000, 10.0);
        add(&mut g, "c", 20_000, 25.0);
        g.add_edge("a", "c", true, false).unwrap();

        let outcome = Binner::new(BinningConfig::default()).run(&g);
        assert!(outcome.edge_bins.is_empty());
        assert_eq!(outcome.conflicts, vec![EdgeKey::new("a", true, "c", true)]);
    }

    #[test]
    fn test_fallback_uses_edge_coverage() {
        let mut g = GraphStore::new(3);
        add(&mut g, "a", 20_000, 10.0);
        for label in ["p", "q", "s", "t"] {
            add(&mut g, label, 200, 10.0);
        }
        g.add_edge("p", "q", true, false).unwrap();
        g.add_edge("s", "t", true, false).unwrap();
        g.edge_mut(&EdgeKey::new("p", true, "q", true)).unwrap().coverage = Some(10.5);
        g.edge_mut(&EdgeKey::new("s", true, "t", true)).unwrap().coverage = Some(100.0);

        let outcome = Binner::new(BinningConfig::default()).run(&g);
        assert_eq!(outcome.fallback_assignments, 1);
        assert_eq!(
            outcome.edge_bins[&EdgeKey::new("p", true, "q", true)],
            Multiplicity::single(1, 1)
        );
        assert_eq!(outcome.unresolved, vec![EdgeKey::new("s", true, "t", true)]);
        assert!(outcome.conflicts.is_empty());

        let summary = outcome.summary();
        assert_eq!(summary.assignments.len(), 1);
        assert_eq!(summary.assignments[0].copies, 1);
        assert!((summary.assignments[0].expected_coverage - 10.0).abs() < 1e-9);
        assert_eq!(summary.unresolved, vec!["s+,t+".to_string()]);
    }
}
