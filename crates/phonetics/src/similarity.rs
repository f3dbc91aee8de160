//! Normalized Indel similarity.

use crate::encoder::PhonemeString;

/// Refusal to score a primary encoding against a fallback one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot compare a {left} phoneme string with a {right} one")]
pub struct EncodingMismatch {
    pub left: &'static str,
    pub right: &'static str,
}

/// Length of the longest common subsequence, O(n·m) time, O(m) space.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diag = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }
    row[b.len()]
}

/// Insertions plus deletions needed to turn `a` into `b`.
pub fn indel_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    a.len() + b.len() - 2 * lcs_len(&a, &b)
}

/// `100 * (1 - indel / (len(a) + len(b)))` over Unicode scalar values;
/// 100 when both strings are empty.
pub fn ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 100.0;
    }
    100.0 * (1.0 - indel_distance(a, b) as f64 / total as f64)
}

/// Similarity of two phoneme strings produced by the same encoding.
pub fn compare_phonemes(a: &PhonemeString, b: &PhonemeString) -> Result<f64, EncodingMismatch> {
    if a.is_primary() != b.is_primary() {
        return Err(EncodingMismatch {
            left: a.kind(),
            right: b.kind(),
        });
    }
    Ok(ratio(a.as_str(), b.as_str()))
}
