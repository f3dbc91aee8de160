//! Score aggregation.

use phonetics::{compare_phonemes, ratio, Phonetics};
use recite_core::{DegradeReason, PhoneticMode, ScoreWeights};
use tracing::warn;

/// Weighted overall score. Inputs are not range checked.
pub fn aggregate(weights: &ScoreWeights, phonetic: f64, prosody: f64) -> f64 {
    weights.phonetic * phonetic + weights.prosody * prosody
}

/// Round to two decimals (half away from zero).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Phonetic similarity of two transcripts and the encoding it was computed on.
///
/// Both sides are encoded; when one side fell back and the other did not,
/// the raw transcripts are compared instead.
pub fn phonetic_score(phonetics: &Phonetics, reference: &str, candidate: &str) -> (f64, PhoneticMode) {
    let reference_ph = phonetics.to_phonemes(reference);
    let candidate_ph = phonetics.to_phonemes(candidate);

    match compare_phonemes(&reference_ph, &candidate_ph) {
        Ok(score) => {
            let reason = reference_ph
                .degrade_reason()
                .or(candidate_ph.degrade_reason())
                .cloned();
            let mode = match reason {
                None => PhoneticMode::Primary,
                Some(reason) => PhoneticMode::Fallback { reason },
            };
            (score, mode)
        }
        Err(mismatch) => {
            warn!("comparison degraded to raw text: {mismatch}");
            (
                ratio(reference, candidate),
                PhoneticMode::RawText {
                    reason: DegradeReason::EncodingMismatch,
                },
            )
        }
    }
}
