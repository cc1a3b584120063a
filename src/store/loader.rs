//! Building a store from adjacency records, and exporting it back.
//!
//! A record names one strand of a vertex (a trailing `'` marks the reverse
//! strand) and lists the strands reachable from it. File-format parsing
//! happens upstream; this module only sees the records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{reverse_complement, Vertex};
use super::{GraphError, GraphStore};

/// Error type for graph loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A record or neighbour reference has no name.
    #[error("Record {0} has an empty name")]
    EmptyName(usize),
    /// Store rejected an operation.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// One strand of a vertex and the strands it leads to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjacencyRecord {
    /// Record name; `'` suffix for the reverse strand.
    pub name: String,
    /// Explicit label; derived from `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Sequence as read on this record's strand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    /// Explicit coverage; derived from `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    /// Names of the strands reachable from this one.
    #[serde(default)]
    pub neighbors: Vec<String>,
}

impl AdjacencyRecord {
    /// Record with a name and neighbour list only.
    pub fn new(name: impl Into<String>, neighbors: Vec<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            sequence: None,
            coverage: None,
            neighbors,
        }
    }

    /// Builder: attach a sequence.
    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }
}

fn split_strand(name: &str) -> (&str, bool) {
    match name.strip_suffix('\'') {
        Some(base) => (base, false),
        None => (name, true),
    }
}

/// Builds a [`GraphStore`] from records.
#[derive(Debug, Clone)]
pub struct GraphLoader {
    default_kmer: usize,
    infer_kmer: bool,
}

impl GraphLoader {
    /// Loader that infers k from the shortest sequence.
    pub fn new(default_kmer: usize) -> Self {
        Self {
            default_kmer,
            infer_kmer: true,
        }
    }

    /// Loader that keeps `kmer` regardless of sequence lengths.
    pub fn pinned(kmer: usize) -> Self {
        Self {
            default_kmer: kmer,
            infer_kmer: false,
        }
    }

    /// Build a store.
    ///
    /// Vertices are created on first mention, whether as a record or as a
    /// neighbour; the first sequence seen for a vertex is kept. An edge listed
    /// from both strands is stored once.
    pub fn load(&self, records: &[AdjacencyRecord]) -> Result<GraphStore, LoadError> {
        let mut graph = GraphStore::new(self.default_kmer);
        let mut labels: BTreeMap<String, String> = BTreeMap::new();

        for (i, record) in records.iter().enumerate() {
            let (base, _) = split_strand(&record.name);
            if base.is_empty() {
                return Err(LoadError::EmptyName(i));
            }
            if let Some(label) = &record.label {
                labels.insert(base.to_string(), label.clone());
            }
        }

        let mut prototypes = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let (base, dir) = split_strand(&record.name);
            let label = self.ensure_vertex(&mut graph, &mut labels, base);

            if let Some(vertex) = graph.get_vertex_mut(&label) {
                if vertex.sequence.is_none() {
                    if let Some(seq) = &record.sequence {
                        vertex.sequence = Some(if dir { seq.clone() } else { reverse_complement(seq) });
                    }
                }
                if let Some(coverage) = record.coverage {
                    vertex.coverage = coverage;
                }
            }

            for neighbor in &record.neighbors {
                let (nbase, ndir) = split_strand(neighbor.trim());
                if nbase.is_empty() {
                    return Err(LoadError::EmptyName(i));
                }
                let nlabel = self.ensure_vertex(&mut graph, &mut labels, nbase);
                prototypes.push((label.clone(), dir, nlabel, ndir));
            }
        }

        if self.infer_kmer {
            let shortest = graph
                .vertices()
                .filter(|v| v.sequence.is_some())
                .map(Vertex::len)
                .min();
            if let Some(shortest) = shortest {
                if shortest > 1 && shortest - 1 != graph.kmer() {
                    info!(
                        default_kmer = graph.kmer(),
                        inferred_kmer = shortest - 1,
                        "k-mer size inferred from shortest sequence"
                    );
                    graph.set_kmer(shortest - 1);
                }
            }
        }

        let weight = -(graph.kmer() as i32);
        let mut duplicates = 0usize;
        for (a, da, b, db) in prototypes {
            if !graph.connect(&a, da, &b, db, weight)? {
                duplicates += 1;
            }
        }
        debug!(
            vertices = graph.num_vertices(),
            edges = graph.num_edges(),
            duplicates,
            kmer = graph.kmer(),
            "graph loaded"
        );
        Ok(graph)
    }

    fn ensure_vertex(
        &self,
        graph: &mut GraphStore,
        labels: &mut BTreeMap<String, String>,
        base: &str,
    ) -> String {
        let label = match labels.get(base) {
            Some(label) => label.clone(),
            None => {
                let vertex = Vertex::from_name(base);
                labels.insert(base.to_string(), vertex.label.clone());
                vertex.label
            }
        };
        if !graph.contains_vertex(&label) {
            let mut vertex = Vertex::from_name(base);
            vertex.label = label.clone();
            graph.add_vertex(vertex, false);
        }
        label
    }
}

/// Serializable export of a store.
///
/// Reloading yields the same labels, sequences, coverages and oriented edges.
/// Composite expansion history and edge weights other than `-kmer` are not kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// k-mer size of the exported store.
    pub kmer: usize,
    /// One record per vertex strand.
    pub records: Vec<AdjacencyRecord>,
}

impl GraphStore {
    /// Adjacency records that [`GraphLoader::load`] turns back into this graph.
    ///
    /// Each vertex yields a forward record and a primed reverse record.
    pub fn to_records(&self) -> Vec<AdjacencyRecord> {
        let mut records = Vec::with_capacity(self.num_vertices() * 2);
        for vertex in self.vertices() {
            for dir in [true, false] {
                let name = if dir {
                    vertex.label.clone()
                } else {
                    format!("{}'", vertex.label)
                };
                let neighbors = self
                    .side_views(&vertex.label, dir)
                    .iter()
                    .map(|v| {
                        if v.to_dir {
                            v.to.to_string()
                        } else {
                            format!("{}'", v.to)
                        }
                    })
                    .collect();
                records.push(AdjacencyRecord {
                    name,
                    label: Some(vertex.label.clone()),
                    sequence: if dir { vertex.sequence.clone() } else { None },
                    coverage: Some(vertex.coverage),
                    neighbors,
                });
            }
        }
        records
    }
}

impl GraphSnapshot {
    /// Export a store.
    pub fn capture(graph: &GraphStore) -> Self {
        let records = graph.to_records();
        Self {
            kmer: graph.kmer(),
            records,
        }
    }

    /// Rebuild the store.
    pub fn restore(&self) -> Result<GraphStore, LoadError> {
        GraphLoader::pinned(self.kmer).load(&self.records)
    }
}
