//! # hybrid-graph-kernel
//!
//! Realtime resolution of bidirected assembly graphs from long-read evidence.
//!
//! Short-read assemblers leave a graph whose repeats cannot be walked
//! unambiguously. Long reads aligned to that graph say which walk is real:
//! this crate finds the walk that matches the spacing of a read's hits and
//! collapses it into a single composite vertex, one read at a time.
//!
//! ## Core Contract
//!
//! 1. Load a bidirected graph once from adjacency records ([`GraphLoader`])
//! 2. For each read, bridge consecutive anchors with a distance-constrained
//!    search ([`Bridger`]) and collapse the resulting path ([`reduce`])
//! 3. Every collapse is reversible ([`revert`])
//! 4. On demand, estimate edge coverage ([`CoverageEstimator`]) and assign
//!    coverage bins to edges ([`Binner`])
//!
//! ## Architecture
//!
//! ```text
//! IngestRequest → normalize → Bridger → reduce
//!                                ↓         ↓
//!                         GraphStore (one lock, per read)
//!                                ↑
//!          RealtimeLoop → CoverageEstimator → Binner
//! ```
//!
//! ## Determinism
//!
//! - Vertices and edges are stored in ordered maps; iteration is by label and canonical key
//! - An edge and its reverse-complement reading share one key
//! - `GraphStore::fingerprint` is stable across reduce/revert round trips

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assembler;
pub mod binner;
pub mod bridging;
pub mod canonical;
pub mod config;
pub mod coverage;
pub mod ingest;
pub mod realtime;
pub mod reducer;
pub mod store;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{Alignment, Composite, Edge, EdgeKey, EdgeView, Path, PathNode, Vertex, VertexKind};
pub use types::{parse_vertex_name, reverse_complement};
pub use config::{BinningConfig, BridgingConfig, ConfigError, CoverageConfig, KernelConfig, RealtimeConfig};
pub use store::{AdjacencyRecord, GraphError, GraphLoader, GraphSnapshot, GraphStore, LoadError};
pub use bridging::{select_anchors, Bridger, PathFinder, ReadBridges, SearchOutcome};
pub use reducer::{reduce, revert, ReduceError};
pub use coverage::{side_coverage, CoverageEstimator, CoverageReport};
pub use binner::{coverage_metric, Bin, Binner, BinningOutcome, BinningSummary, Multiplicity};
pub use ingest::{normalize, HitMessage, IngestError, IngestRequest, IngestResponse, StrandField};
pub use assembler::{Assembler, AssemblerStats, Classification, DrainReport, GraphSummary};
pub use realtime::{LoopHandle, PassHandler, PassReport, RealtimeLoop, ResolutionPass};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version of the wire and snapshot types.
/// Increment on breaking changes to any serialized type.
pub const GRAPH_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
