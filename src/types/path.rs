//! Walks over the bidirected graph.
//!
//! A [`Path`] is an ordered list of oriented vertices. Consecutive nodes overlap
//! by the store's k-mer size, so the cumulative length counts the first node in
//! full and every later node as `len - kmer`.

use serde::{Deserialize, Serialize};

use super::edge::sign;
use super::sequence::oriented;
use super::vertex::Vertex;
use crate::store::{GraphError, GraphStore};

/// One oriented step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathNode {
    /// Vertex label.
    pub label: String,
    /// Strand the walk reads the vertex on.
    pub dir: bool,
    /// Sequence length of the vertex when the node was added.
    pub len: usize,
}

impl PathNode {
    /// Same vertex, same strand.
    pub fn same_end(&self, label: &str, dir: bool) -> bool {
        self.label == label && self.dir == dir
    }
}

impl std::fmt::Display for PathNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.label, sign(self.dir))
    }
}

/// An ordered walk with derived length and deviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    nodes: Vec<PathNode>,
    length: i64,
    deviation: Option<u64>,
    kmer: usize,
}

impl Path {
    /// Empty path over a graph with the given k-mer size.
    pub fn new(kmer: usize) -> Self {
        Self {
            nodes: Vec::new(),
            length: 0,
            deviation: None,
            kmer,
        }
    }

    /// Append a vertex read on `dir`.
    pub fn add_node(&mut self, vertex: &Vertex, dir: bool) {
        self.push(vertex.label.clone(), dir, vertex.len());
    }

    /// Append a node by label and cached length.
    pub fn push(&mut self, label: impl Into<String>, dir: bool, len: usize) {
        self.length += if self.nodes.is_empty() {
            len as i64
        } else {
            len as i64 - self.kmer as i64
        };
        self.nodes.push(PathNode {
            label: label.into(),
            dir,
            len,
        });
    }

    /// Remove the last node, undoing its length contribution.
    pub fn remove_last(&mut self) -> Option<PathNode> {
        let node = self.nodes.pop()?;
        self.length -= if self.nodes.is_empty() {
            node.len as i64
        } else {
            node.len as i64 - self.kmer as i64
        };
        Some(node)
    }

    /// Nodes in walk order.
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cumulative sequence length.
    pub fn length(&self) -> i64 {
        self.length
    }

    /// Overlap between consecutive nodes.
    pub fn kmer(&self) -> usize {
        self.kmer
    }

    /// Distance error against the bridging target; `None` until set.
    pub fn deviation(&self) -> Option<u64> {
        self.deviation
    }

    /// Record the distance error.
    pub fn set_deviation(&mut self, deviation: u64) {
        self.deviation = Some(deviation);
    }

    /// First node.
    pub fn start(&self) -> Option<&PathNode> {
        self.nodes.first()
    }

    /// Last node.
    pub fn end(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    /// Textual id, e.g. `1+,2-,3+`.
    pub fn id(&self) -> String {
        self.nodes
            .iter()
            .map(PathNode::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// The same walk read from the opposite strand.
    pub fn rc(&self) -> Path {
        Path {
            nodes: self
                .nodes
                .iter()
                .rev()
                .map(|n| PathNode {
                    label: n.label.clone(),
                    dir: !n.dir,
                    len: n.len,
                })
                .collect(),
            length: self.length,
            deviation: self.deviation,
            kmer: self.kmer,
        }
    }

    /// Append `other` when it starts where this path ends.
    ///
    /// The shared node is kept once. Returns `false` without change otherwise.
    pub fn join(&mut self, other: &Path) -> bool {
        let (Some(end), Some(start)) = (self.end(), other.start()) else {
            return false;
        };
        if !end.same_end(&start.label, start.dir) {
            return false;
        }
        for node in &other.nodes[1..] {
            self.push(node.label.clone(), node.dir, node.len);
        }
        self.deviation = match (self.deviation, other.deviation) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
        true
    }

    /// Assembled sequence of the walk.
    ///
    /// Every node but the last contributes its oriented sequence truncated to
    /// `len - kmer`; the last contributes in full.
    pub fn spelling(&self, graph: &GraphStore) -> Result<String, GraphError> {
        let mut spelled = String::with_capacity(self.length.max(0) as usize);
        let last = self.nodes.len().saturating_sub(1);
        for (i, node) in self.nodes.iter().enumerate() {
            let vertex = graph
                .get_vertex(&node.label)
                .ok_or_else(|| GraphError::VertexNotFound(node.label.clone()))?;
            let seq = oriented(vertex.sequence.as_deref().unwrap_or(""), node.dir);
            if i == last {
                spelled.push_str(&seq);
            } else {
                let keep = seq.len().saturating_sub(self.kmer);
                spelled.push_str(&seq[..keep]);
            }
        }
        Ok(spelled)
    }

    /// Length-weighted mean of member vertex coverage.
    pub fn average_coverage(&self, graph: &GraphStore) -> Result<f64, GraphError> {
        let mut weighted = 0.0;
        let mut total_len = 0.0;
        let mut plain = 0.0;
        for node in &self.nodes {
            let vertex = graph
                .get_vertex(&node.label)
                .ok_or_else(|| GraphError::VertexNotFound(node.label.clone()))?;
            weighted += vertex.coverage * vertex.len() as f64;
            total_len += vertex.len() as f64;
            plain += vertex.coverage;
        }
        if self.nodes.is_empty() {
            return Ok(0.0);
        }
        if total_len > 0.0 {
            Ok(weighted / total_len)
        } else {
            Ok(plain / self.nodes.len() as f64)
        }
    }

    /// Rebuild a path from its textual id (`1+,2-,3+`).
    ///
    /// Composite labels are bracketed (`[1+,2-]+,3+`) and kept whole. Every
    /// label must exist and consecutive nodes must be joined by an edge.
    pub fn from_description(graph: &GraphStore, description: &str) -> Result<Path, GraphError> {
        let mut path = Path::new(graph.kmer());
        for token in split_top_level(description).into_iter().map(str::trim).filter(|t| !t.is_empty()) {
            let (label, dir) = match token.char_indices().last() {
                Some((idx, '+')) => (&token[..idx], true),
                Some((idx, '-')) => (&token[..idx], false),
                _ => return Err(GraphError::InvalidPath(format!("missing strand in {token}"))),
            };
            let vertex = graph
                .get_vertex(label)
                .ok_or_else(|| GraphError::VertexNotFound(label.to_string()))?;
            if let Some(prev) = path.end() {
                if !graph.contains_edge(&prev.label, prev.dir, label, dir) {
                    return Err(GraphError::InvalidPath(format!(
                        "no edge {}{} -> {}{}",
                        prev.label,
                        sign(prev.dir),
                        label,
                        sign(dir)
                    )));
                }
            }
            path.add_node(vertex, dir);
        }
        if path.is_empty() {
            return Err(GraphError::InvalidPath("empty description".to_string()));
        }
        Ok(path)
    }
}

fn split_top_level(description: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in description.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&description[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&description[start..]);
    parts
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}
