//! Performance benchmarks for bridging and classification.
//!
//! Run with: `cargo bench --bench bridging`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Bridge search | <1ms p99 | Bubble chain, 8 bubbles |
//! | Coverage estimate | <10ms p99 | 1k vertex chain |
//! | Binning | <10ms p99 | 1k vertex chain |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use hybrid_graph_kernel::{
    Binner, BinningConfig, BridgingConfig, CoverageConfig, CoverageEstimator, GraphStore,
    PathFinder, Vertex,
};

const KMER: usize = 21;

/// `s0 -> {u0, w0} -> s1 -> ... -> sN`, every vertex 100 bp.
fn bubble_chain(bubbles: usize) -> GraphStore {
    let mut g = GraphStore::new(KMER);
    let seq = "ACGT".repeat(25);
    for i in 0..=bubbles {
        g.add_vertex(Vertex::new(format!("s{i}")).with_sequence(seq.clone()), false);
    }
    for i in 0..bubbles {
        for alt in ["u", "w"] {
            let mid = format!("{alt}{i}");
            g.add_vertex(Vertex::new(mid.clone()).with_sequence(seq.clone()), false);
            g.add_edge(&format!("s{i}"), &mid, true, false).unwrap();
            g.add_edge(&mid, &format!("s{}", i + 1), true, false).unwrap();
        }
    }
    g
}

/// Linear chain with two coverage populations over long vertices.
fn long_chain(n: usize) -> GraphStore {
    let mut g = GraphStore::new(KMER);
    let seq = "T".repeat(12_000);
    for i in 0..n {
        let cov = if i % 2 == 0 { 8.0 } else { 30.0 };
        g.add_vertex(Vertex::new(i.to_string()).with_sequence(seq.clone()).with_coverage(cov), false);
    }
    for i in 1..n {
        g.add_edge(&(i - 1).to_string(), &i.to_string(), true, false).unwrap();
    }
    g
}

/// Benchmark bridge search across a growing number of bubbles.
fn bench_bridge_search(c: &mut Criterion) {
    let finder = PathFinder::new(BridgingConfig::default());
    let mut group = c.benchmark_group("bridge_search");

    for bubbles in [2usize, 4, 8] {
        let g = bubble_chain(bubbles);
        let dst = format!("s{bubbles}");
        // Each step past `s0` adds len - k.
        let distance = (2 * bubbles) as i64 * (100 - KMER as i64);

        group.throughput(Throughput::Elements(1 << bubbles));
        group.bench_with_input(BenchmarkId::from_parameter(bubbles), &g, |b, g| {
            b.iter(|| finder.find_paths(black_box(g), "s0", true, &dst, true, black_box(distance)))
        });
    }

    group.finish();
}

/// Benchmark coverage estimation on long chains.
fn bench_coverage_estimate(c: &mut Criterion) {
    let estimator = CoverageEstimator::new(CoverageConfig::default());
    let mut group = c.benchmark_group("coverage_estimate");

    for n in [100usize, 1_000] {
        let g = long_chain(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &g, |b, g| {
            b.iter_batched(
                || g.clone(),
                |mut g| estimator.estimate(black_box(&mut g)),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

/// Benchmark clustering and propagation.
fn bench_binning(c: &mut Criterion) {
    let binner = Binner::new(BinningConfig::default());
    let mut group = c.benchmark_group("binning");

    for n in [100usize, 1_000] {
        let g = long_chain(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &g, |b, g| {
            b.iter(|| binner.run(black_box(g)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bridge_search, bench_coverage_estimate, bench_binning);
criterion_main!(benches);
