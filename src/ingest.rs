//! Wire format of the evidence ingest boundary.
//!
//! An aligner reports hits in 0-based half-open coordinates. [`normalize`]
//! turns one read's hits into 1-based inclusive [`Alignment`]s against live
//! vertex labels, rejecting the whole read on the first unusable hit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::store::GraphStore;
use crate::types::{parse_vertex_name, Alignment};

/// Errors rejecting a read at the ingest boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// A hit names a target that is not a vertex of the graph.
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    /// Coordinates fall outside the sequence or run backwards.
    #[error("invalid coordinates on {target}: {reason}")]
    InvalidCoordinates {
        /// Target name as sent.
        target: String,
        /// What is wrong.
        reason: String,
    },

    /// Strand is neither a flag nor `+` / `-`.
    #[error("unknown strand {0:?}")]
    UnknownStrand(String),
}

/// Strand as sent by the client: a boolean flag or a PAF-style symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrandField {
    /// `true` for the forward strand.
    Flag(bool),
    /// `+` or `-`.
    Symbol(String),
}

impl StrandField {
    /// Forward strand flag.
    pub fn forward(&self) -> Result<bool, IngestError> {
        match self {
            StrandField::Flag(f) => Ok(*f),
            StrandField::Symbol(s) => match s.as_str() {
                "+" => Ok(true),
                "-" => Ok(false),
                other => Err(IngestError::UnknownStrand(other.to_string())),
            },
        }
    }
}

impl From<bool> for StrandField {
    fn from(forward: bool) -> Self {
        StrandField::Flag(forward)
    }
}

/// One aligner hit, 0-based half-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitMessage {
    /// Assembler name or label of the target vertex.
    pub target_name: String,
    /// Target length; zero means "use the vertex length".
    #[serde(default)]
    pub target_length: usize,
    /// Target start (inclusive).
    pub target_start: usize,
    /// Target end (exclusive).
    pub target_end: usize,
    /// Read name.
    #[serde(default)]
    pub query_name: String,
    /// Read length.
    pub query_length: usize,
    /// Read start (inclusive).
    pub query_start: usize,
    /// Read end (exclusive).
    pub query_end: usize,
    /// Strand of the target the read aligns to.
    pub strand: StrandField,
    /// Aligner score.
    #[serde(default)]
    pub score: i64,
    /// Mapping quality.
    #[serde(default)]
    pub quality: u32,
}

/// All hits of one read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Read identifier.
    pub read_id: String,
    /// Hits in any order.
    #[serde(default)]
    pub hits: Vec<HitMessage>,
}

/// Reply to an ingest call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Echoed read identifier.
    pub read_id: String,
    /// The read changed the graph.
    pub useful: bool,
}

impl IngestResponse {
    /// Response for a read that contributed nothing.
    pub fn useless(read_id: impl Into<String>) -> Self {
        Self {
            read_id: read_id.into(),
            useful: false,
        }
    }
}

fn invalid(target: &str, reason: impl Into<String>) -> IngestError {
    IngestError::InvalidCoordinates {
        target: target.to_string(),
        reason: reason.into(),
    }
}

/// Convert a read's hits into alignments against `graph`.
///
/// Target names match a label directly or through their assembler name.
/// The first hit for each target is primary; later hits to the same target
/// are kept as secondary.
pub fn normalize(request: &IngestRequest, graph: &GraphStore) -> Result<Vec<Alignment>, IngestError> {
    let mut seen = BTreeSet::new();
    let mut alignments = Vec::with_capacity(request.hits.len());
    for hit in &request.hits {
        let label = if graph.contains_vertex(&hit.target_name) {
            hit.target_name.clone()
        } else {
            parse_vertex_name(&hit.target_name).0
        };
        let vertex = graph
            .get_vertex(&label)
            .ok_or_else(|| IngestError::UnknownTarget(hit.target_name.clone()))?;
        let strand = hit.strand.forward()?;

        let target_length = if hit.target_length == 0 {
            vertex.len()
        } else {
            hit.target_length
        };
        if hit.query_start >= hit.query_end || hit.query_end > hit.query_length {
            return Err(invalid(
                &hit.target_name,
                format!(
                    "read span [{}, {}) outside length {}",
                    hit.query_start, hit.query_end, hit.query_length
                ),
            ));
        }
        if hit.target_start >= hit.target_end || hit.target_end > target_length {
            return Err(invalid(
                &hit.target_name,
                format!(
                    "target span [{}, {}) outside length {}",
                    hit.target_start, hit.target_end, target_length
                ),
            ));
        }

        let primary = seen.insert(label.clone());
        alignments.push(Alignment {
            read_id: request.read_id.clone(),
            read_length: hit.query_length,
            read_start: hit.query_start + 1,
            read_end: hit.query_end,
            target: label,
            target_length,
            target_start: hit.target_start + 1,
            target_end: hit.target_end,
            strand,
            score: hit.score,
            quality: hit.quality,
            primary,
        });
    }
    Ok(alignments)
}
