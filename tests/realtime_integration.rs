//! Integration tests for streaming resolution.
//!
//! Reads are queued on an [`Assembler`] and resolved by a [`RealtimeLoop`]
//! running a [`ResolutionPass`] on its own thread.

use std::time::{Duration, Instant};

use hybrid_graph_kernel::{
    Assembler, GraphStore, HitMessage, IngestRequest, KernelConfig, RealtimeConfig, RealtimeLoop,
    ResolutionPass, Vertex,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// a -> b -> c, 1 kb each, k = 3.
fn build_linear_graph() -> GraphStore {
    let mut g = GraphStore::new(3);
    for label in ["a", "b", "c"] {
        g.add_vertex(Vertex::new(label).with_sequence("T".repeat(1_000)), false);
    }
    g.add_edge("a", "b", true, false).unwrap();
    g.add_edge("b", "c", true, false).unwrap();
    g
}

fn hit(target: &str, query_start: usize) -> HitMessage {
    HitMessage {
        target_name: target.to_string(),
        target_length: 1_000,
        target_start: 0,
        target_end: 1_000,
        query_name: "read".to_string(),
        query_length: 4_000,
        query_start,
        query_end: query_start + 1_000,
        strand: true.into(),
        score: 1_000,
        quality: 60,
    }
}

fn spanning_read(id: &str) -> IngestRequest {
    IngestRequest {
        read_id: id.to_string(),
        hits: vec![hit("a", 0), hit("c", 1_994)],
    }
}

fn fast_config() -> RealtimeConfig {
    RealtimeConfig {
        min_interval_ms: 10,
        min_new_reads: 1,
        shutdown_timeout_ms: 5_000,
        classify_each_pass: false,
    }
}

fn wait_for(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming passes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_queued_read_resolved_by_loop() {
    let assembler = Assembler::new(build_linear_graph(), KernelConfig::default());
    let realtime = RealtimeLoop::start(fast_config(), ResolutionPass::new(assembler.clone())).unwrap();
    let handle = realtime.handle();

    assembler.enqueue(spanning_read("r1"));
    handle.notify_reads(1);

    assert!(wait_for(|| assembler.queued() == 0 && handle.passes() >= 1));
    assert!(assembler.with_graph(|g| g.contains_vertex("[a+,b+,c+]")));
    assert_eq!(assembler.stats().reads_useful, 1);

    let last = realtime.stop().unwrap();
    assert!(last.final_pass);
}

#[test]
fn test_stop_drains_pending_reads() {
    let assembler = Assembler::new(build_linear_graph(), KernelConfig::default());
    let config = RealtimeConfig {
        min_interval_ms: 60_000,
        min_new_reads: 100,
        ..fast_config()
    };
    let realtime = RealtimeLoop::start(config, ResolutionPass::new(assembler.clone())).unwrap();

    assembler.enqueue(spanning_read("r1"));
    realtime.handle().notify_reads(1);
    assert_eq!(assembler.queued(), 1);

    let report = realtime.stop().unwrap();
    assert!(report.final_pass);
    assert_eq!(report.reads, 1);
    assert_eq!(report.useful, 1);
    assert_eq!(assembler.queued(), 0);
    assert_eq!(assembler.summary().composites, 1);
}

#[test]
fn test_final_pass_classifies_graph() {
    let assembler = Assembler::new(build_linear_graph(), KernelConfig::default());
    let pass = ResolutionPass::new(assembler.clone()).with_classification(true);
    let realtime = RealtimeLoop::start(fast_config(), pass).unwrap();

    let report = realtime.stop().unwrap();
    let classification = report.classification.unwrap();
    // 1 kb vertices are below the significance length, so nothing seeds a bin.
    assert_eq!(classification.bins, 0);
    assert_eq!(classification.resolved_edges, 0);
    assert_eq!(classification.conflicts, 0);
}

#[test]
fn test_rejected_read_does_not_stall_queue() {
    let assembler = Assembler::new(build_linear_graph(), KernelConfig::default());
    let realtime = RealtimeLoop::start(fast_config(), ResolutionPass::new(assembler.clone())).unwrap();
    let before = assembler.summary();

    assembler.enqueue(IngestRequest {
        read_id: "bad".to_string(),
        hits: vec![hit("a", 0), hit("missing", 1_994)],
    });
    assembler.enqueue(spanning_read("good"));
    realtime.handle().notify_reads(2);

    let report = realtime.stop().unwrap();
    let stats = assembler.stats();
    assert_eq!(stats.reads_seen, 2);
    assert_eq!(stats.reads_rejected, 1);
    assert_eq!(stats.reads_useful, 1);
    assert_ne!(assembler.summary().fingerprint, before.fingerprint);
    assert!(report.final_pass);
}
