//! Canonical serialization for deterministic hashing.
//!
//! Used for configuration hashes and graph fingerprints.
//!
//! ## Determinism Guarantees
//!
//! - Struct fields serialize in declaration order
//! - Collections hashed here come from `BTreeMap`/`BTreeSet` or sorted `Vec`s
//! - Floats are quantized to integers before they enter a hash

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Quantization factor for float normalization.
pub const FLOAT_QUANTIZATION_FACTOR: f64 = 1_000_000.0;

/// Quantize a float to an i64 for deterministic hashing.
pub fn quantize_float(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Values whose serialization fails (maps with non-string keys) hash as empty input.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Labels {
        labels: Vec<String>,
        kmer: usize,
    }

    #[test]
    fn test_determinism() {
        let a = Labels {
            labels: vec!["1".to_string(), "2".to_string()],
            kmer: 127,
        };
        let b = Labels {
            labels: vec!["1".to_string(), "2".to_string()],
            kmer: 127,
        };
        assert_eq!(canonical_hash_hex(&a), canonical_hash_hex(&b));
        assert_eq!(canonical_hash_hex(&a).len(), 16);
    }

    #[test]
    fn test_quantize_float() {
        assert_eq!(quantize_float(0.01), 10_000);
        assert_eq!(quantize_float(3.0), 3_000_000);
    }
}
