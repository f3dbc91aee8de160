//! Shape similarity of two pitch contours.

use recite_core::{PitchContour, RecitationError, RecitationResult};

/// Standard deviations at or below this are treated as zero.
pub const MIN_STD_DEV: f64 = 1e-9;

/// Z-score both contours (population standard deviation) and return their
/// cosine similarity × 100.
///
/// The score is not clamped. A flat contour has no shape to compare, so a
/// zero standard deviation on either side is
/// [`RecitationError::UndefinedSimilarity`].
pub fn compare_pitch(a: &PitchContour, b: &PitchContour) -> RecitationResult<f64> {
    if a.len() != b.len() {
        return Err(RecitationError::InvalidInput(format!(
            "contour lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let (std_a, std_b) = (a.std_dev(), b.std_dev());
    if std_a <= MIN_STD_DEV || std_b <= MIN_STD_DEV {
        return Err(RecitationError::UndefinedSimilarity(format!(
            "flat pitch contour (std {std_a:.3e} / {std_b:.3e})"
        )));
    }

    let (mean_a, mean_b) = (a.mean(), b.mean());
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.values().iter().zip(b.values()) {
        let za = (x - mean_a) / std_a;
        let zb = (y - mean_b) / std_b;
        dot += za * zb;
        norm_a += za * za;
        norm_b += zb * zb;
    }
    Ok(100.0 * dot / (norm_a.sqrt() * norm_b.sqrt()))
}
