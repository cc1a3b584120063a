//! Golden tests for the hybrid graph kernel.
//!
//! These pin down the store identity rules, bridging distances, reduce/revert
//! round trips and the coverage and binning outcomes on small fixed graphs.

use hybrid_graph_kernel::{
    reduce, revert, side_coverage, AdjacencyRecord, Binner, BinningConfig, BridgingConfig,
    CoverageConfig, CoverageEstimator, GraphLoader, GraphSnapshot, GraphStore, Path, PathFinder,
    Vertex,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn add(g: &mut GraphStore, label: &str, seq: &str, cov: f64) {
    g.add_vertex(Vertex::new(label).with_sequence(seq).with_coverage(cov), false);
}

/// A+ -> B+ -> C+ with k = 3 and 10 bp sequences.
fn build_chain() -> GraphStore {
    let mut g = GraphStore::new(3);
    add(&mut g, "A", "ACGTACGTAC", 10.0);
    add(&mut g, "B", "TACGGGGGCA", 10.0);
    add(&mut g, "C", "GCATTTTTTT", 10.0);
    g.add_edge("A", "B", true, false).unwrap();
    g.add_edge("B", "C", true, false).unwrap();
    g
}

/// x -> a -> b -> c -> y with a tail z -> a.
fn build_branching_graph() -> GraphStore {
    let mut g = GraphStore::new(3);
    for label in ["x", "a", "b", "c", "y", "z"] {
        add(&mut g, label, "GGGGGGGGGG", 5.0);
    }
    g.add_edge("x", "a", true, false).unwrap();
    g.add_edge("z", "a", true, false).unwrap();
    g.add_edge("a", "b", true, true).unwrap();
    g.add_edge("b", "c", false, false).unwrap();
    g.add_edge("c", "y", true, false).unwrap();
    g
}

fn labels(g: &GraphStore) -> Vec<String> {
    g.vertices().map(|v| v.label.clone()).collect()
}

fn edge_ids(g: &GraphStore) -> Vec<String> {
    g.edges().map(|e| e.key.to_string()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Store identity
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_vertex_labels_unique() {
    let mut g = GraphStore::new(3);
    assert!(g.add_vertex(Vertex::new("1"), false));
    assert!(!g.add_vertex(Vertex::new("1"), false));
    assert_eq!(g.num_vertices(), 1);
}

#[test]
fn test_duplicate_edge_rejected() {
    let mut g = build_chain();
    add(&mut g, "D", "AAAAAAAAAA", 1.0);
    assert!(g.add_edge("A", "D", true, false).unwrap());
    let count = g.num_edges();
    assert!(!g.add_edge("A", "D", true, false).unwrap());
    assert_eq!(g.num_edges(), count);
}

#[test]
fn test_reverse_complement_edge_is_same_edge() {
    let mut g = build_chain();
    add(&mut g, "D", "AAAAAAAAAA", 1.0);
    assert!(g.add_edge("A", "D", true, false).unwrap());
    let count = g.num_edges();
    assert!(!g.add_edge("D", "A", false, true).unwrap());
    assert_eq!(g.num_edges(), count);
    // Stored once, readable as A+ -> D+ or D- -> A-.
    assert!(g.contains_edge("A", true, "D", true));
    assert!(g.contains_edge("D", false, "A", false));
}

// ─────────────────────────────────────────────────────────────────────────────
// Bridging
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_two_hop_bridge_has_zero_deviation() {
    let g = build_chain();
    let finder = PathFinder::new(BridgingConfig::default());
    let paths = finder.find_paths(&g, "A", true, "C", true, 14).unwrap();
    let best = &paths[0];
    assert_eq!(best.id(), "A+,B+,C+");
    assert_eq!(best.deviation(), Some(0));
}

#[test]
fn test_spelling_matches_length() {
    let g = build_chain();
    let p = Path::from_description(&g, "A+,B+,C+").unwrap();
    assert_eq!(p.spelling(&g).unwrap().len() as i64, p.length());
    let rc = p.rc();
    assert_eq!(rc.spelling(&g).unwrap().len() as i64, rc.length());
}

// ─────────────────────────────────────────────────────────────────────────────
// Reduce / revert
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reduce_revert_round_trip() {
    let mut g = build_branching_graph();
    let before_labels = labels(&g);
    let before_edges = edge_ids(&g);
    let before_fingerprint = g.fingerprint();

    let path = Path::from_description(&g, "a+,b-,c+").unwrap();
    let composite = reduce(&mut g, &path).unwrap();
    assert!(g.contains_vertex(&composite));
    // `a` has three neighbours and stays; `b` and `c` are absorbed.
    assert!(g.contains_vertex("a"));
    assert!(!g.contains_vertex("b"));
    assert!(!g.contains_vertex("c"));

    revert(&mut g, &composite).unwrap();
    assert_eq!(labels(&g), before_labels);
    assert_eq!(edge_ids(&g), before_edges);
    assert_eq!(g.fingerprint(), before_fingerprint);
}

#[test]
fn test_snapshot_reload_preserves_fingerprint() {
    let g = build_branching_graph();
    let snapshot = GraphSnapshot::capture(&g);
    let json = serde_json::to_string(&snapshot).unwrap();
    let back: GraphSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back.restore().unwrap().fingerprint(), g.fingerprint());
}

#[test]
fn test_loader_reads_assembler_names() {
    let records = vec![
        AdjacencyRecord::new("EDGE_1_length_10_cov_12.5", vec!["EDGE_2_length_10_cov_3.0'".into()])
            .with_sequence("ACGTACGTAC"),
        AdjacencyRecord::new("EDGE_2_length_10_cov_3.0", vec![]).with_sequence("GGGGGCCCCC"),
    ];
    let g = GraphLoader::pinned(3).load(&records).unwrap();
    assert_eq!(g.get_vertex("1").unwrap().coverage, 12.5);
    assert!(g.contains_edge("1", true, "2", false));
}

// ─────────────────────────────────────────────────────────────────────────────
// Coverage and binning
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_parallel_paths_balance_flow() {
    let mut g = GraphStore::new(3);
    add(&mut g, "p", &"A".repeat(50), 10.0);
    add(&mut g, "q", &"C".repeat(50), 20.0);
    g.add_edge("p", "q", true, false).unwrap();
    g.add_edge("q", "p", true, false).unwrap();

    let config = CoverageConfig::default();
    let report = CoverageEstimator::new(config.clone()).estimate(&mut g);
    assert!(report.converged);
    for label in ["p", "q"] {
        let diff = side_coverage(&g, label, true) - side_coverage(&g, label, false);
        assert!(diff.abs() <= config.epsilon);
    }
}

#[test]
fn test_two_coverage_populations() {
    let mut g = GraphStore::new(127);
    let members = [("1", 11_000, 5.0), ("2", 12_000, 5.0), ("3", 13_000, 5.0), ("4", 14_000, 40.0), ("5", 15_000, 40.0)];
    for (label, len, cov) in members {
        add(&mut g, label, &"T".repeat(len), cov);
    }

    let bins = Binner::new(BinningConfig::default()).cluster(&g);
    assert_eq!(bins.len(), 2);
    let low = bins.iter().find(|b| b.est_cov < 10.0).unwrap();
    let high = bins.iter().find(|b| b.est_cov > 10.0).unwrap();
    assert!((low.est_cov - 5.0).abs() < 1e-9);
    assert!((high.est_cov - 40.0).abs() < 1e-9);
    assert_eq!(low.tot_len, 36_000);
    assert_eq!(high.tot_len, 29_000);
}
