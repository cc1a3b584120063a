//! Nucleotide helpers.

/// Complement a single IUPAC nucleotide code, preserving case.
///
/// Unknown symbols map to `N`.
pub fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' | b'u' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        b'S' | b'W' | b'N' => base,
        b'n' => b'n',
        _ => b'N',
    }
}

/// Reverse complement of a nucleotide string.
pub fn reverse_complement(seq: &str) -> String {
    seq.bytes().rev().map(|b| complement(b) as char).collect()
}

/// Sequence as read along the given strand (`true` = forward).
pub fn oriented(seq: &str, dir: bool) -> String {
    if dir {
        seq.to_string()
    } else {
        reverse_complement(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ACGTN"), "NACGT");
        assert_eq!(reverse_complement("aacg"), "cgtt");
        assert_eq!(reverse_complement(""), "");
    }

    #[test]
    fn test_reverse_complement_is_involution() {
        let seq = "GATTACARYKM";
        assert_eq!(reverse_complement(&reverse_complement(seq)), seq);
    }

    #[test]
    fn test_oriented() {
        assert_eq!(oriented("AAC", true), "AAC");
        assert_eq!(oriented("AAC", false), "GTT");
    }
}
