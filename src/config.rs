//! Kernel tunables.
//!
//! Every component takes its section of [`KernelConfig`] at construction, so
//! independent pipelines can run side by side with different settings.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! `params_hash` quantizes floats (×1e6, rounded to i64) before hashing so the
//! same configuration always produces the same hash.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_hash_hex, quantize_float};

/// Error raised for unusable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A tunable is out of range.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// JSON could not be parsed.
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Config file could not be read.
    #[error("Config read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Path search and alignment filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgingConfig {
    /// Largest accepted |residual distance| at the destination.
    pub tolerance: i64,
    /// Maximum number of extensions in one search.
    pub max_depth: usize,
    /// Gaps longer than this are not bridged.
    pub max_distance: i64,
    /// Wall-clock budget for one search, in milliseconds.
    pub search_budget_ms: u64,
    /// Minimum mapping quality for an anchor.
    pub min_quality: u32,
    /// Absolute overhang tolerance in bases.
    pub overhang_absolute: usize,
    /// Overhang tolerance relative to target length.
    pub overhang_ratio: f64,
    /// Capacity of the failed-search cache.
    pub failed_search_cache: usize,
}

impl Default for BridgingConfig {
    fn default() -> Self {
        Self {
            tolerance: 500,
            max_depth: 300,
            max_distance: 10_000,
            search_budget_ms: 21_588,
            min_quality: 10,
            overhang_absolute: 300,
            overhang_ratio: 0.25,
            failed_search_cache: 1024,
        }
    }
}

/// Fixed-point coverage estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Iteration cap.
    pub max_iterations: usize,
    /// Relative correction below which an edge counts as converged.
    pub epsilon: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            epsilon: 0.01,
        }
    }
}

/// Coverage binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinningConfig {
    /// Vertices longer than this seed the clustering.
    pub significance_length: usize,
    /// Clustering radius under the coverage metric.
    pub cluster_epsilon: f64,
    /// Largest degree a clustered vertex may have and still join a bin.
    pub max_member_degree: usize,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            significance_length: 10_000,
            cluster_epsilon: 3.0,
            max_member_degree: 2,
        }
    }
}

/// Realtime pass throttling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Minimum time between passes, in milliseconds.
    pub min_interval_ms: u64,
    /// Minimum new reads between passes.
    pub min_new_reads: usize,
    /// How long shutdown waits for an in-flight pass, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Run coverage estimation and binning at the end of each pass.
    pub classify_each_pass: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 1_000,
            min_new_reads: 1,
            shutdown_timeout_ms: 5_000,
            classify_each_pass: true,
        }
    }
}

/// Complete kernel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// k-mer size used until the loader infers one.
    pub default_kmer: usize,
    /// Bridging section.
    pub bridging: BridgingConfig,
    /// Coverage section.
    pub coverage: CoverageConfig,
    /// Binning section.
    pub binning: BinningConfig,
    /// Realtime section.
    pub realtime: RealtimeConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_kmer: 127,
            bridging: BridgingConfig::default(),
            coverage: CoverageConfig::default(),
            binning: BinningConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

/// Quantized parameters for deterministic hashing.
#[derive(Serialize)]
struct QuantizedParams {
    default_kmer: usize,
    tolerance: i64,
    max_depth: usize,
    max_distance: i64,
    search_budget_ms: u64,
    min_quality: u32,
    overhang_absolute: usize,
    overhang_ratio: i64,
    max_iterations: usize,
    epsilon: i64,
    significance_length: usize,
    cluster_epsilon: i64,
    max_member_degree: usize,
}

impl KernelConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.default_kmer == 0 {
            return Err(invalid("default_kmer", "must be positive"));
        }
        if self.bridging.tolerance <= 0 {
            return Err(invalid("bridging.tolerance", "must be positive"));
        }
        if self.bridging.max_depth == 0 {
            return Err(invalid("bridging.max_depth", "must be positive"));
        }
        if !(self.bridging.overhang_ratio > 0.0 && self.bridging.overhang_ratio <= 1.0) {
            return Err(invalid("bridging.overhang_ratio", "must be in (0, 1]"));
        }
        if self.coverage.max_iterations == 0 {
            return Err(invalid("coverage.max_iterations", "must be positive"));
        }
        if !(self.coverage.epsilon > 0.0) {
            return Err(invalid("coverage.epsilon", "must be positive"));
        }
        if !(self.binning.cluster_epsilon > 0.0) {
            return Err(invalid("binning.cluster_epsilon", "must be positive"));
        }
        Ok(())
    }

    /// Hash of the algorithmic parameters.
    ///
    /// Realtime throttles are excluded: they change scheduling, not results.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&QuantizedParams {
            default_kmer: self.default_kmer,
            tolerance: self.bridging.tolerance,
            max_depth: self.bridging.max_depth,
            max_distance: self.bridging.max_distance,
            search_budget_ms: self.bridging.search_budget_ms,
            min_quality: self.bridging.min_quality,
            overhang_absolute: self.bridging.overhang_absolute,
            overhang_ratio: quantize_float(self.bridging.overhang_ratio),
            max_iterations: self.coverage.max_iterations,
            epsilon: quantize_float(self.coverage.epsilon),
            significance_length: self.binning.significance_length,
            cluster_epsilon: quantize_float(self.binning.cluster_epsilon),
            max_member_degree: self.binning.max_member_degree,
        })
    }
}
