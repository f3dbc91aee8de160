//! Нормализованные по времени контуры высоты тона.

use std::path::Path;

use recite_core::{
    AudioBuffer, PitchConfig, PitchContour, RecitationError, RecitationResult, CONTOUR_LEN,
};
use tracing::debug;

use crate::yin::track_pitch;

/// Decode `path` and extract its [`CONTOUR_LEN`]-point pitch contour.
pub fn extract_pitch_contour(
    path: impl AsRef<Path>,
    config: &PitchConfig,
) -> RecitationResult<PitchContour> {
    let path = path.as_ref();
    let mono = audio::load_mono(path, config.sample_rate)?;
    debug!("pitch: {} ({:.2}s)", path.display(), mono.duration());
    extract_pitch_contour_from_samples(&mono.samples, mono.sample_rate, config)
}

/// Contour of in-memory mono samples; resampled first when `sample_rate`
/// differs from the analysis rate.
pub fn extract_pitch_contour_from_samples(
    samples: &[f32],
    sample_rate: usize,
    config: &PitchConfig,
) -> RecitationResult<PitchContour> {
    if samples.is_empty() {
        return Err(RecitationError::Decode("no samples to analyse".into()));
    }
    config.validate()?;

    let f0 = if sample_rate == config.sample_rate {
        track_pitch(samples, config)
    } else {
        let buffer = AudioBuffer::new(samples.to_vec(), sample_rate, 1);
        let resampled = audio::Resampler::new(config.sample_rate).resample(&buffer)?;
        if resampled.samples.is_empty() {
            return Err(RecitationError::Decode("no samples left after resampling".into()));
        }
        track_pitch(&resampled.samples, config)
    };

    PitchContour::new(normalize_length(&f0, CONTOUR_LEN))
}

/// Linear interpolation of `series` at `points` evenly spaced positions over
/// `[0, len]`; positions past the last sample take its value.
pub fn normalize_length(series: &[f64], points: usize) -> Vec<f64> {
    let Some(&last) = series.last() else {
        return Vec::new();
    };
    if points == 1 {
        return vec![series[0]];
    }
    let n = series.len() as f64;
    (0..points)
        .map(|i| {
            let x = n * i as f64 / (points - 1) as f64;
            let lo = x.floor() as usize;
            if lo + 1 >= series.len() {
                return last;
            }
            let frac = x - lo as f64;
            series[lo] + (series[lo + 1] - series[lo]) * frac
        })
        .collect()
}
