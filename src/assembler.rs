//! Per-read resolution pipeline over a shared graph.
//!
//! [`Assembler`] owns the graph behind one mutex. Each read is normalized,
//! bridged and reduced inside a single critical section, so searches always
//! see stable neighbour lists and no two reads mutate the graph at once.
//! Reads may also be queued and drained later by the realtime loop.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binner::{Binner, BinningOutcome};
use crate::bridging::Bridger;
use crate::config::KernelConfig;
use crate::coverage::{CoverageEstimator, CoverageReport};
use crate::ingest::{normalize, IngestError, IngestRequest, IngestResponse};
use crate::reducer::{self, ReduceError};
use crate::store::{GraphSnapshot, GraphStore};

/// Running counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerStats {
    /// Reads submitted.
    pub reads_seen: u64,
    /// Reads that changed the graph.
    pub reads_useful: u64,
    /// Reads rejected at the ingest boundary.
    pub reads_rejected: u64,
    /// Anchor pairs bridged.
    pub bridges_found: u64,
    /// Anchor pairs without a path.
    pub bridges_failed: u64,
    /// Paths collapsed into composites.
    pub paths_reduced: u64,
}

/// Shape of the live graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Overlap length.
    pub kmer: usize,
    /// Vertex count.
    pub vertices: usize,
    /// Edge count.
    pub edges: usize,
    /// Composite vertex count.
    pub composites: usize,
    /// Mutation counter.
    pub generation: u64,
    /// Canonical hash of labels and edges.
    pub fingerprint: String,
}

/// Coverage estimation followed by binning.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Estimator outcome.
    pub coverage: CoverageReport,
    /// Binner outcome.
    pub binning: BinningOutcome,
}

/// Result of draining the read queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Reads processed.
    pub reads: usize,
    /// Reads that changed the graph.
    pub useful: usize,
}

struct Inner {
    graph: GraphStore,
    bridger: Bridger,
    stats: AssemblerStats,
}

/// Shared handle to the graph and its resolution pipeline.
#[derive(Clone)]
pub struct Assembler {
    inner: Arc<Mutex<Inner>>,
    queue: Arc<Mutex<VecDeque<IngestRequest>>>,
    config: Arc<KernelConfig>,
}

impl Assembler {
    /// Wrap a loaded graph.
    pub fn new(graph: GraphStore, config: KernelConfig) -> Self {
        let bridger = Bridger::new(config.bridging.clone());
        Self {
            inner: Arc::new(Mutex::new(Inner {
                graph,
                bridger,
                stats: AssemblerStats::default(),
            })),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            config: Arc::new(config),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Process one read. Rejected reads are logged and reported as not useful.
    pub fn ingest(&self, request: &IngestRequest) -> IngestResponse {
        match self.try_ingest(request) {
            Ok(response) => response,
            Err(e) => {
                warn!(read_id = %request.read_id, error = %e, "read rejected");
                IngestResponse::useless(request.read_id.clone())
            }
        }
    }

    /// Process one read, surfacing ingest errors.
    ///
    /// A read with no hits, or whose hits do not validate, leaves the graph untouched.
    pub fn try_ingest(&self, request: &IngestRequest) -> Result<IngestResponse, IngestError> {
        let mut guard = self.inner.lock();
        let Inner { graph, bridger, stats } = &mut *guard;
        stats.reads_seen += 1;

        if request.hits.is_empty() {
            return Ok(IngestResponse::useless(request.read_id.clone()));
        }
        let alignments = match normalize(request, graph) {
            Ok(a) => a,
            Err(e) => {
                stats.reads_rejected += 1;
                return Err(e);
            }
        };

        let bridges = bridger.bridge_read(graph, &alignments);
        stats.bridges_found += bridges.bridged as u64;
        stats.bridges_failed += bridges.failed as u64;

        let mut reduced = 0;
        for path in bridges.paths.iter().filter(|p| p.len() > 1) {
            match reducer::reduce(graph, path) {
                Ok(label) => {
                    debug!(read_id = %request.read_id, composite = %label, "read path reduced");
                    reduced += 1;
                }
                Err(e) => {
                    warn!(read_id = %request.read_id, path = %path, error = %e, "path not reduced");
                }
            }
        }
        stats.paths_reduced += reduced;
        let useful = reduced > 0;
        if useful {
            stats.reads_useful += 1;
        }

        debug!(
            read_id = %request.read_id,
            anchors = bridges.anchors,
            bridged = bridges.bridged,
            failed = bridges.failed,
            reduced,
            "read processed"
        );
        Ok(IngestResponse {
            read_id: request.read_id.clone(),
            useful,
        })
    }

    /// Queue a read for the next realtime pass. Returns the queue length.
    pub fn enqueue(&self, request: IngestRequest) -> usize {
        let mut queue = self.queue.lock();
        queue.push_back(request);
        queue.len()
    }

    /// Reads waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Process every queued read, each under its own critical section.
    pub fn drain_queue(&self) -> DrainReport {
        let batch: Vec<IngestRequest> = self.queue.lock().drain(..).collect();
        let mut report = DrainReport::default();
        for request in &batch {
            report.reads += 1;
            if self.ingest(request).useful {
                report.useful += 1;
            }
        }
        report
    }

    /// Estimate edge coverage and bin the graph, holding the lock throughout.
    pub fn classify(&self) -> Classification {
        let mut guard = self.inner.lock();
        let coverage = CoverageEstimator::new(self.config.coverage.clone()).estimate(&mut guard.graph);
        let binning = Binner::new(self.config.binning.clone()).run(&guard.graph);
        info!(
            converged = coverage.converged,
            iterations = coverage.iterations,
            bins = binning.bins.len(),
            unresolved = binning.unresolved.len(),
            "graph classified"
        );
        Classification { coverage, binning }
    }

    /// Expand a composite vertex one level.
    pub fn revert(&self, label: &str) -> Result<Vec<String>, ReduceError> {
        let mut guard = self.inner.lock();
        reducer::revert(&mut guard.graph, label)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> AssemblerStats {
        self.inner.lock().stats.clone()
    }

    /// Shape and fingerprint of the live graph.
    pub fn summary(&self) -> GraphSummary {
        let guard = self.inner.lock();
        let graph = &guard.graph;
        GraphSummary {
            kmer: graph.kmer(),
            vertices: graph.num_vertices(),
            edges: graph.num_edges(),
            composites: graph.vertices().filter(|v| v.is_composite()).count(),
            generation: graph.generation(),
            fingerprint: graph.fingerprint(),
        }
    }

    /// Export the live graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(&self.inner.lock().graph)
    }

    /// Run `f` against the graph under the lock.
    pub fn with_graph<R>(&self, f: impl FnOnce(&GraphStore) -> R) -> R {
        f(&self.inner.lock().graph)
    }
}
