//! Collapsing resolved paths into composite vertices, and expanding them back.
//!
//! A composite is labelled with the bracketed path id (`[1+,2-,3+]`). Its forward strand
//! reads the path as given: leaving the composite on `+` continues from the
//! path's last node, leaving on `-` continues backwards out of its first node.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::store::{GraphError, GraphStore};
use crate::types::{Composite, EdgeKey, Path, PathNode, Vertex, VertexKind};

/// Error type for reduce/revert.
///
/// Every variant is raised before the graph is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReduceError {
    /// Fewer than two nodes.
    #[error("Path too short to collapse: {0} node(s)")]
    TooShort(usize),
    /// A vertex occurs twice in the path.
    #[error("Path visits vertex {0} more than once")]
    RepeatedVertex(String),
    /// Consecutive nodes are not joined by an edge.
    #[error("Missing junction edge {0}")]
    MissingJunction(String),
    /// The composite label is taken.
    #[error("Composite label already in use: {0}")]
    LabelInUse(String),
    /// Lookup or invariant failure in the store.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

struct Reconnect {
    side: bool,
    to: String,
    to_dir: bool,
    weight: i32,
}

/// Collapse `path` into one composite vertex; returns the composite label.
///
/// Edges leaving the path at its start (against the entry strand) and at its
/// end (along the exit strand) are copied onto the composite. Path vertices
/// with at most two neighbour entries are then removed and kept inside the
/// composite for [`revert`].
pub fn reduce(graph: &mut GraphStore, path: &Path) -> Result<String, ReduceError> {
    let nodes = path.nodes();
    if nodes.len() < 2 {
        return Err(ReduceError::TooShort(nodes.len()));
    }
    let mut seen = BTreeSet::new();
    for node in nodes {
        if !graph.contains_vertex(&node.label) {
            return Err(GraphError::VertexNotFound(node.label.clone()).into());
        }
        if !seen.insert(node.label.as_str()) {
            return Err(ReduceError::RepeatedVertex(node.label.clone()));
        }
    }
    let mut junction_weights = Vec::with_capacity(nodes.len() - 1);
    for pair in nodes.windows(2) {
        let key = EdgeKey::new(&pair[0].label, pair[0].dir, &pair[1].label, pair[1].dir);
        let edge = graph
            .edge(&key)
            .ok_or_else(|| ReduceError::MissingJunction(key.to_string()))?;
        junction_weights.push(edge.weight);
    }
    let label = format!("[{}]", path.id());
    if graph.contains_vertex(&label) {
        return Err(ReduceError::LabelInUse(label));
    }

    let first = &nodes[0];
    let last = &nodes[nodes.len() - 1];
    let removable: BTreeSet<&str> = nodes
        .iter()
        .filter(|n| graph.degree(&n.label) <= 2)
        .map(|n| n.label.as_str())
        .collect();

    // Far ends that are themselves collapsed map back onto the composite.
    let map_target = |to: &str, to_dir: bool| -> (String, bool) {
        if removable.contains(to) {
            if to == first.label && to_dir == first.dir {
                return (label.clone(), true);
            }
            if to == last.label && to_dir != last.dir {
                return (label.clone(), false);
            }
        }
        (to.to_string(), to_dir)
    };

    let mut reconnect = Vec::new();
    for view in graph.side_views(&first.label, !first.dir) {
        let (to, to_dir) = map_target(view.to, view.to_dir);
        let weight = graph.edge(view.key).map_or(-(graph.kmer() as i32), |e| e.weight);
        reconnect.push(Reconnect { side: false, to, to_dir, weight });
    }
    for view in graph.side_views(&last.label, last.dir) {
        let (to, to_dir) = map_target(view.to, view.to_dir);
        let weight = graph.edge(view.key).map_or(-(graph.kmer() as i32), |e| e.weight);
        reconnect.push(Reconnect { side: true, to, to_dir, weight });
    }

    let sequence = path.spelling(graph)?;
    let coverage = path.average_coverage(graph)?;
    let removable: Vec<String> = removable.into_iter().map(str::to_string).collect();

    // Mutation starts here.
    let mut composite = Vertex::new(label.clone())
        .with_sequence(sequence)
        .with_coverage(coverage);
    composite.kind = VertexKind::Composite(Box::new(Composite {
        components: path.clone(),
        junction_weights,
        retired: Vec::new(),
    }));
    graph.add_vertex(composite, false);

    for r in &reconnect {
        graph.connect(&label, r.side, &r.to, r.to_dir, r.weight)?;
    }

    let mut retired = Vec::with_capacity(removable.len());
    for vertex_label in &removable {
        retired.push(graph.remove_vertex(vertex_label)?);
    }
    if let Some(VertexKind::Composite(c)) = graph.get_vertex_mut(&label).map(|v| &mut v.kind) {
        c.retired = retired;
    }

    info!(
        composite = %label,
        nodes = nodes.len(),
        removed = removable.len(),
        reconnected = reconnect.len(),
        "path collapsed"
    );
    Ok(label)
}

/// Path end a traversal leaving the composite on `side` continues from.
fn leaving_end<'a>(first: &'a PathNode, last: &'a PathNode, side: bool) -> (&'a str, bool) {
    if side {
        (&last.label, last.dir)
    } else {
        (&first.label, !first.dir)
    }
}

/// Path end a traversal entering the composite on `dir` arrives at.
fn entering_end<'a>(first: &'a PathNode, last: &'a PathNode, dir: bool) -> (&'a str, bool) {
    if dir {
        (&first.label, first.dir)
    } else {
        (&last.label, !last.dir)
    }
}

/// Expand a composite vertex back into its path; returns the re-added labels.
pub fn revert(graph: &mut GraphStore, label: &str) -> Result<Vec<String>, ReduceError> {
    let vertex = graph
        .get_vertex(label)
        .ok_or_else(|| GraphError::VertexNotFound(label.to_string()))?;
    let composite = vertex
        .composite()
        .ok_or_else(|| GraphError::NotComposite(label.to_string()))?
        .clone();
    let nodes = composite.components.nodes();
    let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
        return Err(GraphError::InvalidPath(format!("composite {label} has no components")).into());
    };
    for node in nodes {
        let available = graph.contains_vertex(&node.label)
            || composite.retired.iter().any(|v| v.label == node.label);
        if !available {
            return Err(GraphError::VertexNotFound(node.label.clone()).into());
        }
    }

    let mut reconnect = Vec::new();
    for view in graph.views(label) {
        let weight = graph.edge(view.key).map_or(-(graph.kmer() as i32), |e| e.weight);
        let (from, from_dir) = leaving_end(first, last, view.from_dir);
        let (to, to_dir) = if view.to == label {
            entering_end(first, last, view.to_dir)
        } else {
            (view.to, view.to_dir)
        };
        reconnect.push((from.to_string(), from_dir, to.to_string(), to_dir, weight));
    }

    let mut restored = Vec::new();
    for vertex in &composite.retired {
        if graph.add_vertex(vertex.clone(), false) {
            restored.push(vertex.label.clone());
        }
    }
    for (from, from_dir, to, to_dir, weight) in &reconnect {
        graph.connect(from, *from_dir, to, *to_dir, *weight)?;
    }
    for (pair, weight) in nodes.windows(2).zip(&composite.junction_weights) {
        graph.connect(&pair[0].label, pair[0].dir, &pair[1].label, pair[1].dir, *weight)?;
    }
    graph.remove_vertex(label)?;

    debug!(composite = %label, restored = restored.len(), "composite expanded");
    Ok(restored)
}
