//! Graph storage.
//!
//! [`GraphStore`] is an arena of vertices keyed by label and edges keyed by their
//! canonical [`EdgeKey`](crate::types::EdgeKey). Edges refer to endpoints by label;
//! vertices list their incident edges by key. Both sides are always updated together.

pub mod loader;
pub mod memory;

pub use loader::{AdjacencyRecord, GraphLoader, GraphSnapshot, LoadError};
pub use memory::GraphStore;

/// Error type for store lookups and invariant violations.
///
/// Duplicate insertions are not errors: `add_vertex`/`add_edge` report them as `false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Label not present.
    #[error("Vertex not found: {0}")]
    VertexNotFound(String),
    /// Edge not present.
    #[error("Edge not found: {0}")]
    EdgeNotFound(String),
    /// Expansion requested on a primitive vertex.
    #[error("Vertex is not a composite: {0}")]
    NotComposite(String),
    /// Path description or walk is not realisable in the graph.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
