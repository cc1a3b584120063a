//! Core types for the assembly graph kernel.

pub mod alignment;
pub mod edge;
pub mod path;
pub mod sequence;
pub mod vertex;

pub use alignment::Alignment;
pub use edge::{sign, Edge, EdgeKey, EdgeView, Incidence};
pub use path::{Path, PathNode};
pub use sequence::{complement, oriented, reverse_complement};
pub use vertex::{parse_vertex_name, Composite, Vertex, VertexKind, DEFAULT_COVERAGE};
