//! Bidirected edges.
//!
//! An edge joins two oriented vertex ends. Traversing `(one, d_one) -> (two, d_two)`
//! leaves `one` on strand `d_one` and enters `two` on strand `d_two`. The same
//! physical overlap read from the opposite strand is `(two, !d_two) -> (one, !d_one)`;
//! both readings share one [`EdgeKey`], so equality, ordering and hashing are
//! invariant under reverse complement.

use serde::{Deserialize, Serialize};

/// Render an orientation flag as `+` / `-`.
pub fn sign(dir: bool) -> char {
    if dir {
        '+'
    } else {
        '-'
    }
}

/// Canonical identity of an edge.
///
/// Built from either reading of the edge; the lexicographically smaller
/// reading is stored. Implements `Ord` for deterministic iteration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    /// First endpoint label.
    pub one: String,
    /// Strand leaving `one`.
    pub d_one: bool,
    /// Second endpoint label.
    pub two: String,
    /// Strand entering `two`.
    pub d_two: bool,
}

impl EdgeKey {
    /// Canonical key for the traversal `(a, da) -> (b, db)`.
    pub fn new(a: &str, da: bool, b: &str, db: bool) -> Self {
        let forward = (a, da, b, db);
        let reverse = (b, !db, a, !da);
        let (one, d_one, two, d_two) = if forward <= reverse { forward } else { reverse };
        Self {
            one: one.to_string(),
            d_one,
            two: two.to_string(),
            d_two,
        }
    }

    /// Whether the stored reading is the traversal `(a, da) -> (b, db)`.
    pub fn is_forward_reading(&self, a: &str, da: bool, b: &str, db: bool) -> bool {
        self.one == a && self.d_one == da && self.two == b && self.d_two == db
    }

    /// Both endpoints are the same vertex.
    pub fn is_self_loop(&self) -> bool {
        self.one == self.two
    }

    /// Self-loop that reads identically on both strands, e.g. `A+ -> A-`.
    pub fn is_palindromic(&self) -> bool {
        self.is_self_loop() && self.d_one != self.d_two
    }

    /// Whether `label` is an endpoint.
    pub fn touches(&self, label: &str) -> bool {
        self.one == label || self.two == label
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{},{}{}",
            self.one,
            sign(self.d_one),
            self.two,
            sign(self.d_two)
        )
    }
}

/// An edge stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Canonical identity.
    pub key: EdgeKey,
    /// Overlap weight; `-kmer` for a plain k-mer overlap.
    pub weight: i32,
    /// Estimated read depth, set by the coverage estimator.
    pub coverage: Option<f64>,
}

impl Edge {
    /// Create an edge with no coverage estimate.
    pub fn new(key: EdgeKey, weight: i32) -> Self {
        Self {
            key,
            weight,
            coverage: None,
        }
    }
}

/// One entry of a vertex's neighbour list.
///
/// `reversed` selects which reading of the edge starts at the owning vertex.
/// A non-palindromic self-loop is registered twice on its vertex, once per reading.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Incidence {
    /// The edge.
    pub key: EdgeKey,
    /// Use the reverse reading `(two, !d_two) -> (one, !d_one)`.
    pub reversed: bool,
}

impl Incidence {
    /// Incidence of `key`, read forwards or reversed.
    pub fn new(key: EdgeKey, reversed: bool) -> Self {
        Self { key, reversed }
    }

    /// Read this incidence as a traversal leaving the owning vertex.
    pub fn view(&self) -> EdgeView<'_> {
        EdgeView::new(&self.key, self.reversed)
    }
}

/// An edge read as a traversal from one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeView<'a> {
    /// Edge identity.
    pub key: &'a EdgeKey,
    /// Vertex the traversal leaves.
    pub from: &'a str,
    /// Strand leaving `from`. Doubles as the side of `from` the edge is attached to.
    pub from_dir: bool,
    /// Vertex the traversal enters.
    pub to: &'a str,
    /// Strand entering `to`.
    pub to_dir: bool,
}

impl<'a> EdgeView<'a> {
    /// View `key` forwards or reversed.
    pub fn new(key: &'a EdgeKey, reversed: bool) -> Self {
        if reversed {
            Self {
                key,
                from: &key.two,
                from_dir: !key.d_two,
                to: &key.one,
                to_dir: !key.d_one,
            }
        } else {
            Self {
                key,
                from: &key.one,
                from_dir: key.d_one,
                to: &key.two,
                to_dir: key.d_two,
            }
        }
    }
}
