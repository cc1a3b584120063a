//! Distance-bounded path search between two anchors.
//!
//! ## Distance Convention
//!
//! The expected distance counts what every added node contributes to the
//! path length, i.e. `Σ (len - kmer)` over all nodes after the source,
//! destination included. For two read anchors separated by `gap` bases on the
//! read this is `gap + len(destination)`.
//!
//! ## Search
//!
//! Depth-first with an explicit frame stack. A branch ends when it reaches the
//! destination strand with `|residual| < tolerance` (a hit), when the residual
//! drops below `-tolerance`, or when the depth limit is reached. The wall-clock
//! budget is checked between frames. The graph is only read.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use crate::config::BridgingConfig;
use crate::store::{GraphError, GraphStore};
use crate::types::{Alignment, EdgeView, Path};

/// Result of one search.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Candidate paths; the first has the lowest deviation found.
    pub paths: Vec<Path>,
    /// Extensions tried.
    pub steps: usize,
    /// Search stopped on the wall-clock budget.
    pub timed_out: bool,
}

impl SearchOutcome {
    /// Lowest-deviation path.
    pub fn best(&self) -> Option<&Path> {
        self.paths.first()
    }
}

struct Frame<'g> {
    candidates: Vec<EdgeView<'g>>,
    next: usize,
    remaining: i64,
}

/// Searches the live graph for walks of a given length.
#[derive(Debug, Clone)]
pub struct PathFinder {
    config: BridgingConfig,
}

impl PathFinder {
    /// Create a finder.
    pub fn new(config: BridgingConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &BridgingConfig {
        &self.config
    }

    /// Candidate paths from `(src, src_dir)` to `(dst, dst_dir)`.
    pub fn find_paths(
        &self,
        graph: &GraphStore,
        src: &str,
        src_dir: bool,
        dst: &str,
        dst_dir: bool,
        distance: i64,
    ) -> Result<Vec<Path>, GraphError> {
        Ok(self.search(graph, src, src_dir, dst, dst_dir, distance)?.paths)
    }

    /// Run the search and report how it ended.
    pub fn search(
        &self,
        graph: &GraphStore,
        src: &str,
        src_dir: bool,
        dst: &str,
        dst_dir: bool,
        distance: i64,
    ) -> Result<SearchOutcome, GraphError> {
        let source = graph
            .get_vertex(src)
            .ok_or_else(|| GraphError::VertexNotFound(src.to_string()))?;
        if !graph.contains_vertex(dst) {
            return Err(GraphError::VertexNotFound(dst.to_string()));
        }

        let kmer = graph.kmer() as i64;
        let tolerance = self.config.tolerance;
        let budget = Duration::from_millis(self.config.search_budget_ms);
        let started = Instant::now();

        let mut outcome = SearchOutcome::default();
        let mut path = Path::new(graph.kmer());
        path.add_node(source, src_dir);

        let mut stack = vec![Frame {
            candidates: graph.side_views(src, src_dir),
            next: 0,
            remaining: distance,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next >= frame.candidates.len() {
                stack.pop();
                if !stack.is_empty() {
                    path.remove_last();
                }
                continue;
            }
            let view = frame.candidates[frame.next];
            frame.next += 1;
            let remaining_before = frame.remaining;

            if started.elapsed() > budget {
                outcome.timed_out = true;
                debug!(src, dst, steps = outcome.steps, "search budget exhausted");
                break;
            }
            outcome.steps += 1;

            let Some(next) = graph.get_vertex(view.to) else {
                continue;
            };
            let remaining = remaining_before - (next.len() as i64 - kmer);
            path.add_node(next, view.to_dir);

            if view.to == dst && view.to_dir == dst_dir && remaining.abs() < tolerance {
                let mut hit = path.clone();
                hit.set_deviation(remaining.unsigned_abs());
                debug!(path = %hit, deviation = remaining.unsigned_abs(), "bridge candidate");
                Self::record(&mut outcome.paths, hit);
                path.remove_last();
                continue;
            }

            if remaining < -tolerance || path.len() > self.config.max_depth {
                path.remove_last();
                continue;
            }

            stack.push(Frame {
                candidates: graph.side_views(view.to, view.to_dir),
                next: 0,
                remaining,
            });
        }

        Ok(outcome)
    }

    /// Strictly better candidates go to the front, everything else to the back.
    fn record(paths: &mut Vec<Path>, hit: Path) {
        let better = match (paths.first().and_then(Path::deviation), hit.deviation()) {
            (Some(best), Some(dev)) => dev < best,
            (None, _) => true,
            (Some(_), None) => false,
        };
        if better {
            paths.insert(0, hit);
        } else {
            paths.push(hit);
        }
    }
}

/// Keep the useful alignments of a read, one per competing group.
///
/// Consecutive alignments (in read order) that cover mostly the same read
/// segment form a group. The highest quality wins, then the highest score,
/// then the earliest. The result is in read order.
pub fn select_anchors(alignments: &[Alignment], config: &BridgingConfig) -> Vec<Alignment> {
    let mut useful: Vec<&Alignment> = alignments.iter().filter(|a| a.is_useful(config)).collect();
    useful.sort_by_key(|a| (a.read_start, a.read_end));

    let mut anchors: Vec<Alignment> = Vec::new();
    let mut previous: Option<&Alignment> = None;
    for alignment in useful {
        let competing = previous.is_some_and(|p| p.competes_with(alignment));
        match anchors.last_mut() {
            Some(best) if competing => {
                if (alignment.quality, alignment.score) > (best.quality, best.score) {
                    *best = alignment.clone();
                }
            }
            _ => anchors.push(alignment.clone()),
        }
        previous = Some(alignment);
    }
    anchors
}

/// Paths recovered from one read.
#[derive(Debug, Clone, Default)]
pub struct ReadBridges {
    /// Joined bridges, each with at least two nodes.
    pub paths: Vec<Path>,
    /// Anchors kept after filtering.
    pub anchors: usize,
    /// Consecutive anchor pairs bridged.
    pub bridged: usize,
    /// Consecutive anchor pairs with no path.
    pub failed: usize,
}

type SearchKey = (String, bool, String, bool, i64);

/// Turns a read's alignments into graph paths.
///
/// Remembers searches that found nothing until the graph changes.
pub struct Bridger {
    finder: PathFinder,
    failed: Option<LruCache<SearchKey, ()>>,
    generation: u64,
}

impl Bridger {
    /// Create a bridger.
    pub fn new(config: BridgingConfig) -> Self {
        let failed = NonZeroUsize::new(config.failed_search_cache).map(LruCache::new);
        Self {
            finder: PathFinder::new(config),
            failed,
            generation: 0,
        }
    }

    /// Underlying finder.
    pub fn finder(&self) -> &PathFinder {
        &self.finder
    }

    /// Bridge consecutive anchors of one read.
    ///
    /// A failed or over-long gap splits the read into independent paths.
    pub fn bridge_read(&mut self, graph: &GraphStore, alignments: &[Alignment]) -> ReadBridges {
        if graph.generation() != self.generation {
            if let Some(cache) = self.failed.as_mut() {
                cache.clear();
            }
            self.generation = graph.generation();
        }

        let config = self.finder.config().clone();
        let anchors = select_anchors(alignments, &config);
        let mut result = ReadBridges {
            anchors: anchors.len(),
            ..ReadBridges::default()
        };

        let mut current: Option<Path> = None;
        for pair in anchors.windows(2) {
            let (from, to) = (&pair[0], &pair[1]);
            if from.target == to.target {
                debug!(target = %from.target, "consecutive anchors on one vertex; skipped");
                continue;
            }
            match self.bridge_pair(graph, from, to, &config) {
                Some(path) => {
                    result.bridged += 1;
                    current = match current.take() {
                        Some(mut joined) => {
                            if joined.join(&path) {
                                Some(joined)
                            } else {
                                result.paths.push(joined);
                                Some(path)
                            }
                        }
                        None => Some(path),
                    };
                }
                None => {
                    result.failed += 1;
                    if let Some(done) = current.take() {
                        result.paths.push(done);
                    }
                }
            }
        }
        if let Some(done) = current {
            result.paths.push(done);
        }
        result
    }

    fn bridge_pair(
        &mut self,
        graph: &GraphStore,
        from: &Alignment,
        to: &Alignment,
        config: &BridgingConfig,
    ) -> Option<Path> {
        let gap = from.gap_to(to);
        if gap > config.max_distance {
            debug!(from = %from.target, to = %to.target, gap, "gap too long to bridge");
            return None;
        }
        let dst_len = graph.get_vertex(&to.target)?.len() as i64;
        let distance = gap + dst_len;

        let key: SearchKey = (from.target.clone(), from.strand, to.target.clone(), to.strand, distance);
        if let Some(cache) = self.failed.as_mut() {
            if cache.get(&key).is_some() {
                return None;
            }
        }

        let found = self
            .finder
            .find_paths(graph, &from.target, from.strand, &to.target, to.strand, distance)
            .ok()
            .and_then(|mut paths| (!paths.is_empty()).then(|| paths.swap_remove(0)));

        if found.is_none() {
            if let Some(cache) = self.failed.as_mut() {
                cache.put(key, ());
            }
        }
        found
    }
}
