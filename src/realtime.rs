//! Throttled background resolution passes.
//!
//! [`RealtimeLoop`] runs a [`PassHandler`] on a dedicated thread. A pass starts
//! only once both throttles are satisfied: `min_interval_ms` has elapsed since
//! the previous pass and at least `min_new_reads` reads were announced through
//! a [`LoopHandle`]. Stopping is advisory: the flag is read between passes,
//! one final pass always runs, and [`RealtimeLoop::stop`] waits for it up to
//! `shutdown_timeout_ms`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::Assembler;
use crate::config::RealtimeConfig;

/// Classification figures attached to a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    /// Coverage estimation converged.
    pub converged: bool,
    /// Estimator iterations.
    pub iterations: usize,
    /// Bins found.
    pub bins: usize,
    /// Edges with a bin assignment.
    pub resolved_edges: usize,
    /// Edges left unassigned.
    pub unresolved_edges: usize,
    /// Unassigned edges with disagreeing evidence.
    pub conflicts: usize,
}

/// Record of one completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// Unique pass id.
    pub id: Uuid,
    /// Sequence number, from 1.
    pub pass: u64,
    /// Pass run on shutdown.
    pub final_pass: bool,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Reads processed.
    pub reads: usize,
    /// Reads that changed the graph.
    pub useful: usize,
    /// Present when the pass classified the graph.
    pub classification: Option<ClassificationSummary>,
}

impl PassReport {
    /// Empty report stamped now.
    pub fn begin(pass: u64, final_pass: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            pass,
            final_pass,
            started_at: Utc::now(),
            duration_ms: 0,
            reads: 0,
            useful: 0,
            classification: None,
        }
    }
}

/// Work performed by each pass.
pub trait PassHandler: Send + 'static {
    /// Run pass number `pass`. `final_pass` is set for the shutdown pass.
    fn run_pass(&mut self, pass: u64, final_pass: bool) -> PassReport;
}

/// Drains queued reads and optionally classifies the graph.
pub struct ResolutionPass {
    assembler: Assembler,
    classify: bool,
}

impl ResolutionPass {
    /// Pass over `assembler`; classification follows `classify_each_pass`.
    pub fn new(assembler: Assembler) -> Self {
        let classify = assembler.config().realtime.classify_each_pass;
        Self { assembler, classify }
    }

    /// Override whether passes classify.
    pub fn with_classification(mut self, classify: bool) -> Self {
        self.classify = classify;
        self
    }
}

impl PassHandler for ResolutionPass {
    fn run_pass(&mut self, pass: u64, final_pass: bool) -> PassReport {
        let started = Instant::now();
        let mut report = PassReport::begin(pass, final_pass);

        let drained = self.assembler.drain_queue();
        report.reads = drained.reads;
        report.useful = drained.useful;

        if self.classify {
            let classification = self.assembler.classify();
            report.classification = Some(ClassificationSummary {
                converged: classification.coverage.converged,
                iterations: classification.coverage.iterations,
                bins: classification.binning.bins.len(),
                resolved_edges: classification.binning.edge_bins.len(),
                unresolved_edges: classification.binning.unresolved.len(),
                conflicts: classification.binning.conflicts.len(),
            });
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            target: "hybrid_graph_kernel::metrics",
            pass,
            final_pass,
            reads = report.reads,
            useful = report.useful,
            duration_ms = report.duration_ms,
            "resolution pass"
        );
        report
    }
}

#[derive(Default)]
struct Signals {
    new_reads: usize,
    stop: bool,
    finished: bool,
    passes: u64,
    last_report: Option<PassReport>,
}

#[derive(Default)]
struct Shared {
    signals: Mutex<Signals>,
    wake: Condvar,
    done: Condvar,
}

/// Cloneable handle for announcing reads to a running loop.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    /// Count `n` new reads toward the next pass.
    pub fn notify_reads(&self, n: usize) {
        self.shared.signals.lock().new_reads += n;
        self.shared.wake.notify_one();
    }

    /// Completed passes.
    pub fn passes(&self) -> u64 {
        self.shared.signals.lock().passes
    }

    /// Most recent pass report.
    pub fn last_report(&self) -> Option<PassReport> {
        self.shared.signals.lock().last_report.clone()
    }
}

/// Background loop driving a [`PassHandler`].
pub struct RealtimeLoop {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    config: RealtimeConfig,
}

impl RealtimeLoop {
    /// Spawn the loop thread.
    pub fn start<H: PassHandler>(config: RealtimeConfig, handler: H) -> std::io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let worker_config = config.clone();
        let handle = thread::Builder::new()
            .name("realtime-resolution".to_string())
            .spawn(move || run(worker, worker_config, handler))?;
        info!(
            min_interval_ms = config.min_interval_ms,
            min_new_reads = config.min_new_reads,
            "realtime loop started"
        );
        Ok(Self {
            shared,
            handle: Some(handle),
            config,
        })
    }

    /// Handle for announcing reads and reading progress.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Request the final pass and wait for it, bounded by `shutdown_timeout_ms`.
    ///
    /// Returns the final report, or `None` if the loop did not finish in time.
    pub fn stop(mut self) -> Option<PassReport> {
        self.request_stop();
        let deadline = Instant::now() + Duration::from_millis(self.config.shutdown_timeout_ms);

        let mut signals = self.shared.signals.lock();
        while !signals.finished {
            if self.shared.done.wait_until(&mut signals, deadline).timed_out() {
                break;
            }
        }
        let finished = signals.finished;
        let report = signals.last_report.clone();
        drop(signals);

        let handle = self.handle.take();
        if !finished {
            warn!(
                timeout_ms = self.config.shutdown_timeout_ms,
                "realtime loop did not finish in time; abandoning it"
            );
            return None;
        }
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("realtime worker panicked");
            }
        }
        info!("realtime loop stopped");
        report
    }

    fn request_stop(&self) {
        self.shared.signals.lock().stop = true;
        self.shared.wake.notify_all();
    }
}

impl Drop for RealtimeLoop {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_stop();
        }
    }
}

fn run<H: PassHandler>(shared: Arc<Shared>, config: RealtimeConfig, mut handler: H) {
    let min_interval = Duration::from_millis(config.min_interval_ms);
    let mut last_pass = Instant::now();
    let mut pass = 0;

    loop {
        let final_pass = {
            let mut signals = shared.signals.lock();
            loop {
                if signals.stop {
                    break;
                }
                let elapsed = last_pass.elapsed();
                if elapsed >= min_interval && signals.new_reads >= config.min_new_reads {
                    break;
                }
                if elapsed < min_interval {
                    shared.wake.wait_for(&mut signals, min_interval - elapsed);
                } else {
                    shared.wake.wait(&mut signals);
                }
            }
            signals.new_reads = 0;
            signals.stop
        };

        pass += 1;
        debug!(pass, final_pass, "pass starting");
        let report = handler.run_pass(pass, final_pass);
        last_pass = Instant::now();

        let mut signals = shared.signals.lock();
        signals.passes = pass;
        signals.last_report = Some(report);
        if final_pass {
            signals.finished = true;
            shared.done.notify_all();
            return;
        }
    }
}
