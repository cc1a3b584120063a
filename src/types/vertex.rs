//! Graph vertices.

use std::sync::OnceLock;

use regex_lite::Regex;

use super::edge::Incidence;
use super::path::Path;

/// Coverage assigned when a name carries no depth annotation.
pub const DEFAULT_COVERAGE: f64 = 1.0;

fn assembler_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^EDGE_([^_]+)_length_(\d+)_cov_([0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)")
            .expect("assembler name pattern is valid")
    })
}

/// Split an assembler record name into `(label, coverage)`.
///
/// `EDGE_12_length_500_cov_7.5` gives `("12", 7.5)`. Other underscore-separated
/// names use their second field as label. A trailing `'` (reverse strand marker)
/// is ignored.
pub fn parse_vertex_name(name: &str) -> (String, f64) {
    let name = name.trim_end_matches('\'');
    if let Some(caps) = assembler_name_regex().captures(name) {
        let coverage = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(DEFAULT_COVERAGE);
        return (caps[1].to_string(), coverage);
    }
    match name.split('_').nth(1) {
        Some(label) if !label.is_empty() => (label.to_string(), DEFAULT_COVERAGE),
        _ => (name.to_string(), DEFAULT_COVERAGE),
    }
}

/// Expansion record of a collapsed path.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    /// The collapsed walk, in the composite's forward orientation.
    pub components: Path,
    /// Weights of the junction edges `components[i] -> components[i + 1]`.
    pub junction_weights: Vec<i32>,
    /// Path vertices removed from the graph by the collapse.
    pub retired: Vec<Vertex>,
}

/// Primitive contig or composite produced by collapsing a path.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexKind {
    /// Plain sequence from the input graph.
    Primitive,
    /// Collapsed path; owns what is needed to expand it again.
    Composite(Box<Composite>),
}

/// A vertex of the bidirected graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Unique identity within a store.
    pub label: String,
    /// Display name.
    pub name: String,
    /// Estimated read depth.
    pub coverage: f64,
    /// Forward-strand sequence.
    pub sequence: Option<String>,
    /// Primitive or composite.
    pub kind: VertexKind,
    neighbors: Vec<Incidence>,
}

impl Vertex {
    /// Create a primitive vertex.
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            name: label.clone(),
            label,
            coverage: DEFAULT_COVERAGE,
            sequence: None,
            kind: VertexKind::Primitive,
            neighbors: Vec::new(),
        }
    }

    /// Create a primitive vertex from an assembler record name.
    pub fn from_name(name: &str) -> Self {
        let (label, coverage) = parse_vertex_name(name);
        let mut vertex = Self::new(label);
        vertex.name = name.trim_end_matches('\'').to_string();
        vertex.coverage = coverage;
        vertex
    }

    /// Builder: set sequence.
    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }

    /// Builder: set coverage.
    pub fn with_coverage(mut self, coverage: f64) -> Self {
        self.coverage = coverage;
        self
    }

    /// Sequence length, zero when no payload is attached.
    pub fn len(&self) -> usize {
        self.sequence.as_ref().map_or(0, String::len)
    }

    /// Whether the sequence payload is absent or empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbour list, one entry per edge reading leaving this vertex.
    pub fn neighbors(&self) -> &[Incidence] {
        &self.neighbors
    }

    /// Number of neighbour entries.
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// At most one edge on each side: the vertex lies on a single walk.
    pub fn is_unique(&self) -> bool {
        self.neighbor_count() <= 2
    }

    /// Expansion record, if this vertex is a collapsed path.
    pub fn composite(&self) -> Option<&Composite> {
        match &self.kind {
            VertexKind::Composite(c) => Some(c),
            VertexKind::Primitive => None,
        }
    }

    /// Whether this vertex is a collapsed path.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, VertexKind::Composite(_))
    }

    pub(crate) fn has_incidence(&self, incidence: &Incidence) -> bool {
        self.neighbors.contains(incidence)
    }

    pub(crate) fn push_incidence(&mut self, incidence: Incidence) {
        self.neighbors.push(incidence);
    }

    pub(crate) fn drop_incidences(&mut self, key: &super::EdgeKey) {
        self.neighbors.retain(|inc| &inc.key != key);
    }

    pub(crate) fn clear_incidences(&mut self) {
        self.neighbors.clear();
    }
}
