//! In-memory bidirected graph store.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error};

use crate::canonical::canonical_hash_hex;
use crate::types::{Edge, EdgeKey, EdgeView, Incidence, Vertex};
use super::GraphError;

/// Default k-mer size for a fresh store.
pub const DEFAULT_KMER: usize = 127;

/// Bidirected assembly graph.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug, Clone)]
pub struct GraphStore {
    vertices: BTreeMap<String, Vertex>,
    edges: BTreeMap<EdgeKey, Edge>,
    kmer: usize,
    generation: u64,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new(DEFAULT_KMER)
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    kmer: usize,
    labels: Vec<&'a str>,
    edges: Vec<String>,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new(kmer: usize) -> Self {
        Self {
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            kmer,
            generation: 0,
        }
    }

    /// Overlap between adjacent sequences.
    pub fn kmer(&self) -> usize {
        self.kmer
    }

    /// Change the k-mer size. Edges carrying the old default weight are re-weighted.
    pub fn set_kmer(&mut self, kmer: usize) {
        let old = -(self.kmer as i32);
        for edge in self.edges.values_mut() {
            if edge.weight == old {
                edge.weight = -(kmer as i32);
            }
        }
        self.kmer = kmer;
        self.bump();
    }

    /// Counter bumped by every structural mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    // ========================================================================
    // Vertices
    // ========================================================================

    /// Insert a vertex.
    ///
    /// Returns `false` without mutation if the label exists and `overwrite` is
    /// false. With `overwrite`, the existing vertex loses all its edges first.
    pub fn add_vertex(&mut self, mut vertex: Vertex, overwrite: bool) -> bool {
        if self.vertices.contains_key(&vertex.label) {
            if !overwrite {
                debug!(label = %vertex.label, "vertex already present");
                return false;
            }
            self.detach_edges(&vertex.label);
        }
        vertex.clear_incidences();
        self.vertices.insert(vertex.label.clone(), vertex);
        self.bump();
        true
    }

    /// Remove a vertex and every incident edge.
    pub fn remove_vertex(&mut self, label: &str) -> Result<Vertex, GraphError> {
        if !self.vertices.contains_key(label) {
            return Err(GraphError::VertexNotFound(label.to_string()));
        }
        self.detach_edges(label);
        self.bump();
        self.vertices
            .remove(label)
            .ok_or_else(|| GraphError::VertexNotFound(label.to_string()))
    }

    fn detach_edges(&mut self, label: &str) {
        let mut keys: Vec<EdgeKey> = match self.vertices.get(label) {
            Some(v) => v.neighbors().iter().map(|inc| inc.key.clone()).collect(),
            None => return,
        };
        keys.dedup();
        for key in keys {
            self.remove_edge(&key);
        }
    }

    /// Whether `label` is present.
    pub fn contains_vertex(&self, label: &str) -> bool {
        self.vertices.contains_key(label)
    }

    /// Look up a vertex.
    pub fn get_vertex(&self, label: &str) -> Option<&Vertex> {
        self.vertices.get(label)
    }

    /// Mutable access to vertex attributes. The neighbour list stays store-managed.
    pub fn get_vertex_mut(&mut self, label: &str) -> Option<&mut Vertex> {
        self.vertices.get_mut(label)
    }

    /// All vertices in label order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Insert an edge with the default weight `-kmer`.
    ///
    /// `da` and `db` are end flags: `true` when the edge is attached to that
    /// vertex's forward end. `add_edge(a, b, true, false)` is the walk
    /// `a+ -> b+`, and `add_edge(b, a, false, true)` names the same edge.
    pub fn add_edge(&mut self, a: &str, b: &str, da: bool, db: bool) -> Result<bool, GraphError> {
        let weight = -(self.kmer as i32);
        self.add_edge_weighted(a, b, da, db, weight)
    }

    /// Insert an edge given by end flags, see [`GraphStore::add_edge`].
    pub fn add_edge_weighted(
        &mut self,
        a: &str,
        b: &str,
        da: bool,
        db: bool,
        weight: i32,
    ) -> Result<bool, GraphError> {
        self.connect(a, da, b, !db, weight)
    }

    /// Insert the walk `(a, da) -> (b, db)`, strands on both sides.
    ///
    /// Returns `Ok(false)` without mutation if the edge, or its reverse
    /// complement, already exists. Missing endpoints are an error.
    pub fn connect(
        &mut self,
        a: &str,
        da: bool,
        b: &str,
        db: bool,
        weight: i32,
    ) -> Result<bool, GraphError> {
        let key = EdgeKey::new(a, da, b, db);
        let forward = key.is_forward_reading(a, da, b, db);
        let at_a = Incidence::new(key.clone(), !forward);
        let at_b = Incidence::new(key.clone(), forward);

        let va = self
            .vertices
            .get(a)
            .ok_or_else(|| GraphError::VertexNotFound(a.to_string()))?;
        let vb = self
            .vertices
            .get(b)
            .ok_or_else(|| GraphError::VertexNotFound(b.to_string()))?;

        let in_map = self.edges.contains_key(&key);
        let in_lists = va.has_incidence(&at_a) || vb.has_incidence(&at_b);
        if in_map != in_lists {
            error!(edge = %key, in_map, in_lists, "edge map and neighbour lists disagree");
        }
        if in_map || in_lists {
            debug!(edge = %key, "edge already present");
            return Ok(false);
        }

        let palindromic = key.is_palindromic();
        if let Some(va) = self.vertices.get_mut(a) {
            va.push_incidence(at_a);
        }
        if !palindromic {
            if let Some(vb) = self.vertices.get_mut(b) {
                vb.push_incidence(at_b);
            }
        }
        self.edges.insert(key.clone(), Edge::new(key, weight));
        self.bump();
        Ok(true)
    }

    /// Remove an edge from both endpoints and the edge map.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> Option<Edge> {
        let edge = self.edges.remove(key)?;
        if let Some(v) = self.vertices.get_mut(&key.one) {
            v.drop_incidences(key);
        }
        if let Some(v) = self.vertices.get_mut(&key.two) {
            v.drop_incidences(key);
        }
        self.bump();
        Some(edge)
    }

    /// Whether the walk `(a, da) -> (b, db)` or its reverse complement exists.
    pub fn contains_edge(&self, a: &str, da: bool, b: &str, db: bool) -> bool {
        self.edges.contains_key(&EdgeKey::new(a, da, b, db))
    }

    /// Look up an edge.
    pub fn edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    /// Mutable access to edge attributes.
    pub fn edge_mut(&mut self, key: &EdgeKey) -> Option<&mut Edge> {
        self.edges.get_mut(key)
    }

    /// All edges in key order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    // ========================================================================
    // Adjacency
    // ========================================================================

    /// Every edge reading that leaves `label`, in neighbour-list order.
    pub fn views(&self, label: &str) -> Vec<EdgeView<'_>> {
        self.vertices
            .get(label)
            .map(|v| v.neighbors().iter().map(Incidence::view).collect())
            .unwrap_or_default()
    }

    /// Edge readings leaving `label` on strand `dir`.
    pub fn side_views(&self, label: &str, dir: bool) -> Vec<EdgeView<'_>> {
        self.views(label)
            .into_iter()
            .filter(|v| v.from_dir == dir)
            .collect()
    }

    /// Number of edge readings attached to `label`.
    pub fn degree(&self, label: &str) -> usize {
        self.vertices.get(label).map_or(0, Vertex::neighbor_count)
    }

    /// Number of edge readings attached to one side of `label`.
    pub fn side_degree(&self, label: &str, dir: bool) -> usize {
        self.vertices.get(label).map_or(0, |v| {
            v.neighbors()
                .iter()
                .filter(|inc| inc.view().from_dir == dir)
                .count()
        })
    }

    /// Hash of the label set, oriented edge set and k-mer size.
    ///
    /// Two stores with the same structure have the same fingerprint regardless
    /// of insertion order.
    pub fn fingerprint(&self) -> String {
        canonical_hash_hex(&FingerprintInput {
            kmer: self.kmer,
            labels: self.vertices.keys().map(String::as_str).collect(),
            edges: self
                .edges
                .values()
                .map(|e| format!("{}:{}", e.key, e.weight))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(labels: &[&str]) -> GraphStore {
        let mut g = GraphStore::new(3);
        for label in labels {
            assert!(g.add_vertex(Vertex::new(*label).with_sequence("ACGTACGTAC"), false));
        }
        g
    }

    #[test]
    fn test_add_vertex_no_duplicate_labels() {
        let mut g = store_with(&["a"]);
        assert!(!g.add_vertex(Vertex::new("a"), false));
        assert_eq!(g.num_vertices(), 1);
        assert_eq!(g.get_vertex("a").unwrap().len(), 10);
    }

    #[test]
    fn test_overwrite_drops_edges() {
        let mut g = store_with(&["a", "b"]);
        g.add_edge("a", "b", true, false).unwrap();
        assert!(g.add_vertex(Vertex::new("a").with_coverage(4.0), true));
        assert_eq!(g.num_edges(), 0);
        assert_eq!(g.degree("b"), 0);
        assert_eq!(g.get_vertex("a").unwrap().coverage, 4.0);
    }

    #[test]
    fn test_duplicate_edge_rejected() {
        let mut g = store_with(&["a", "b"]);
        assert!(g.add_edge("a", "b", true, true).unwrap());
        assert!(!g.add_edge("a", "b", true, true).unwrap());
        assert_eq!(g.num_edges(), 1);
    }

    #[test]
    fn test_reverse_complement_edge_rejected() {
        let mut g = store_with(&["a", "b"]);
        assert!(g.add_edge("a", "b", true, false).unwrap());
        assert!(!g.add_edge("b", "a", false, true).unwrap());
        assert_eq!(g.num_edges(), 1);
        assert_eq!(g.degree("a"), 1);
        assert_eq!(g.degree("b"), 1);
        assert!(g.contains_edge("a", true, "b", true));
        assert!(g.contains_edge("b", false, "a", false));
    }

    #[test]
    fn test_end_flags_are_unordered() {
        for (da, db) in [(true, true), (true, false), (false, true), (false, false)] {
            let mut g = store_with(&["a", "b"]);
            assert!(g.add_edge("a", "b", da, db).unwrap());
            assert!(!g.add_edge("b", "a", db, da).unwrap());
            assert_eq!(g.num_edges(), 1);
        }
    }

    #[test]
    fn test_connect_takes_walk_strands() {
        let mut g = store_with(&["a", "b"]);
        assert!(g.connect("a", true, "b", false, -3).unwrap());
        assert!(!g.add_edge("a", "b", true, true).unwrap());
        assert!(g.contains_edge("b", true, "a", false));
    }

    #[test]
    fn test_two_edges_between_same_pair() {
        let mut g = store_with(&["a", "b"]);
        assert!(g.add_edge("a", "b", true, false).unwrap());
        assert!(g.add_edge("b", "a", true, false).unwrap());
        assert_eq!(g.num_edges(), 2);
        assert_eq!(g.side_degree("a", true), 1);
        assert_eq!(g.side_degree("a", false), 1);
    }

    #[test]
    fn test_add_edge_missing_endpoint() {
        let mut g = store_with(&["a"]);
        assert_eq!(
            g.add_edge("a", "zz", true, false),
            Err(GraphError::VertexNotFound("zz".to_string()))
        );
        assert_eq!(g.num_edges(), 0);
    }

    #[test]
    fn test_views_follow_orientation() {
        let mut g = store_with(&["a", "b"]);
        g.add_edge("a", "b", true, true).unwrap();

        let from_a = g.views("a");
        assert_eq!(from_a.len(), 1);
        assert_eq!((from_a[0].from_dir, from_a[0].to, from_a[0].to_dir), (true, "b", false));

        let from_b = g.views("b");
        assert_eq!((from_b[0].from_dir, from_b[0].to, from_b[0].to_dir), (true, "a", false));
    }

    #[test]
    fn test_self_loops() {
        let mut g = store_with(&["a"]);
        assert!(g.add_edge("a", "a", true, false).unwrap());
        assert_eq!(g.degree("a"), 2);
        assert!(g.add_edge("a", "a", true, true).unwrap());
        assert_eq!(g.degree("a"), 3);
        assert!(!g.add_edge("a", "a", false, true).unwrap());

        g.remove_vertex("a").unwrap();
        assert_eq!(g.num_edges(), 0);
    }

    #[test]
    fn test_remove_edge_is_two_sided() {
        let mut g = store_with(&["a", "b"]);
        g.add_edge("a", "b", true, false).unwrap();
        let key = EdgeKey::new("b", false, "a", false);
        let removed = g.remove_edge(&key).unwrap();
        assert_eq!(removed.weight, -3);
        assert_eq!(g.degree("a"), 0);
        assert_eq!(g.degree("b"), 0);
        assert!(g.remove_edge(&key).is_none());
    }

    #[test]
    fn test_remove_vertex() {
        let mut g = store_with(&["a", "b", "c"]);
        g.add_edge("a", "b", true, false).unwrap();
        g.add_edge("b", "c", true, false).unwrap();
        let removed = g.remove_vertex("b").unwrap();
        assert_eq!(removed.neighbor_count(), 0);
        assert_eq!(g.num_edges(), 0);
        assert!(matches!(g.remove_vertex("b"), Err(GraphError::VertexNotFound(_))));
    }

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let mut g1 = store_with(&["a", "b", "c"]);
        g1.add_edge("a", "b", true, false).unwrap();
        g1.add_edge("b", "c", true, true).unwrap();

        let mut g2 = store_with(&["c", "b", "a"]);
        g2.add_edge("c", "b", true, true).unwrap();
        g2.add_edge("b", "a", false, true).unwrap();

        assert_eq!(g1.fingerprint(), g2.fingerprint());
        g2.remove_edge(&EdgeKey::new("a", true, "b", true));
        assert_ne!(g1.fingerprint(), g2.fingerprint());
    }

    #[test]
    fn test_set_kmer_reweights_default_edges() {
        let mut g = store_with(&["a", "b", "c"]);
        g.add_edge("a", "b", true, false).unwrap();
        g.add_edge_weighted("b", "c", true, false, 40).unwrap();
        g.set_kmer(5);
        let weights: Vec<i32> = g.edges().map(|e| e.weight).collect();
        assert!(weights.contains(&-5));
        assert!(weights.contains(&40));
    }
}
