//! Per-bin copy counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::bin::Bin;

/// How many times an edge (or vertex side) is traversed by each bin.
///
/// Zero counts are never stored, so two multiplicities are equal exactly when
/// they agree on every bin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multiplicity {
    counts: BTreeMap<u32, u32>,
}

impl Multiplicity {
    /// Empty multiplicity.
    pub fn new() -> Self {
        Self::default()
    }

    /// One bin with count `m`.
    pub fn single(bin: u32, m: u32) -> Self {
        let mut out = Self::new();
        out.set(bin, m);
        out
    }

    fn set(&mut self, bin: u32, m: u32) {
        if m == 0 {
            self.counts.remove(&bin);
        } else {
            self.counts.insert(bin, m);
        }
    }

    /// Count for `bin`, zero when absent.
    pub fn count(&self, bin: u32) -> u32 {
        self.counts.get(&bin).copied().unwrap_or(0)
    }

    /// `(bin, count)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.counts.iter().map(|(b, m)| (*b, *m))
    }

    /// Add `other` in place.
    pub fn add(&mut self, other: &Multiplicity) {
        for (bin, m) in other.iter() {
            let total = self.count(bin).saturating_add(m);
            self.set(bin, total);
        }
    }

    /// `self - other`, or `None` when any bin would go negative.
    pub fn checked_sub(&self, other: &Multiplicity) -> Option<Multiplicity> {
        let mut out = self.clone();
        for (bin, m) in other.iter() {
            let diff = self.count(bin).checked_sub(m)?;
            out.set(bin, diff);
        }
        Some(out)
    }

    /// Total copies over all bins.
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    /// No copies in any bin.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Expected coverage: copies weighted by bin depth.
    pub fn coverage(&self, bins: &[Bin]) -> f64 {
        self.iter()
            .filter_map(|(id, m)| bins.iter().find(|b| b.id == id).map(|b| m as f64 * b.est_cov))
            .sum()
    }
}

impl std::fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|(b, m)| format!("{b}:{m}")).collect();
        write!(f, "<{}>", parts.join(" "))
    }
}
