//! Long-read alignment records consumed by bridging.
//!
//! Coordinates are 1-based inclusive on both the read and the target contig.

use serde::{Deserialize, Serialize};

use crate::config::BridgingConfig;

/// One alignment of a read segment to a graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    /// Read identifier.
    pub read_id: String,
    /// Read length.
    pub read_length: usize,
    /// First aligned read base.
    pub read_start: usize,
    /// Last aligned read base.
    pub read_end: usize,
    /// Target vertex label.
    pub target: String,
    /// Target sequence length.
    pub target_length: usize,
    /// First aligned target base.
    pub target_start: usize,
    /// Last aligned target base.
    pub target_end: usize,
    /// `true` when the read aligns to the forward strand of the target.
    pub strand: bool,
    /// Aligner score.
    pub score: i64,
    /// Mapping quality.
    pub quality: u32,
    /// Primary (not secondary/supplementary) hit.
    pub primary: bool,
}

impl Alignment {
    /// Overhang allowed at either end of the alignment.
    pub fn overhang_tolerance(&self, config: &BridgingConfig) -> i64 {
        let relative = config.overhang_ratio * self.target_length as f64;
        (config.overhang_absolute as f64).min(relative) as i64
    }

    /// Both ends of the alignment reach an end of the read or of the contig.
    pub fn has_good_margin(&self, config: &BridgingConfig) -> bool {
        let tolerance = self.overhang_tolerance(config);
        let read_left = self.read_start as i64 - 1;
        let read_right = self.read_length as i64 - self.read_end as i64;
        let ref_left = self.target_start as i64 - 1;
        let ref_right = self.target_length as i64 - self.target_end as i64;

        (read_left < tolerance || ref_left < tolerance)
            && (read_right < tolerance || ref_right < tolerance)
            && ref_left.min(ref_right) < tolerance
    }

    /// Alignment may anchor a bridge.
    pub fn is_useful(&self, config: &BridgingConfig) -> bool {
        self.primary && self.quality >= config.min_quality && self.has_good_margin(config)
    }

    /// Read interval the whole target would occupy if it aligned end to end.
    pub fn projected_read_span(&self) -> (i64, i64) {
        let rs = self.read_start as i64;
        let re = self.read_end as i64;
        let ts = self.target_start as i64;
        let te = self.target_end as i64;
        let tl = self.target_length as i64;
        if self.strand {
            (rs - (ts - 1), re + (tl - te))
        } else {
            (rs - (tl - te), re + (ts - 1))
        }
    }

    /// Read bases covered by both alignments.
    pub fn read_overlap(&self, other: &Alignment) -> usize {
        let start = self.read_start.max(other.read_start);
        let end = self.read_end.min(other.read_end);
        (end + 1).saturating_sub(start)
    }

    /// The alignments cover mostly the same read segment.
    ///
    /// True when the shared span exceeds half of the shorter alignment, so
    /// neighbours overlapping by only a k-mer stay apart.
    pub fn competes_with(&self, other: &Alignment) -> bool {
        let shorter = (self.read_end + 1 - self.read_start).min(other.read_end + 1 - other.read_start);
        self.read_overlap(other) * 2 > shorter
    }

    /// Bases between the projected target ends on the read; negative when they overlap.
    pub fn gap_to(&self, next: &Alignment) -> i64 {
        let (_, end) = self.projected_read_span();
        let (start, _) = next.projected_read_span();
        start - end - 1
    }
}
