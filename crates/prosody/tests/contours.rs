//! End-to-end contour extraction from files on disk.

use std::path::Path;

use prosody::{compare_pitch, extract_pitch_contour};
use recite_core::{AudioBuffer, PitchConfig, RecitationError, CONTOUR_LEN};

/// Sine sweeping linearly from `f_start` to `f_end` Hz.
fn write_glide(path: &Path, f_start: f64, f_end: f64, secs: f64, sr: usize) {
    let n = (secs * sr as f64) as usize;
    let mut phase = 0.0f64;
    let samples: Vec<f32> = (0..n)
        .map(|i| {
            let f = f_start + (f_end - f_start) * i as f64 / n as f64;
            phase += 2.0 * std::f64::consts::PI * f / sr as f64;
            (phase.sin() * 0.5) as f32
        })
        .collect();
    audio::write_wav(path, &AudioBuffer::new(samples, sr, 1)).unwrap();
}

#[test]
fn same_recording_scores_100() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("glide.wav");
    write_glide(&path, 120.0, 240.0, 2.0, 16000);

    let config = PitchConfig::default();
    let a = extract_pitch_contour(&path, &config).unwrap();
    let b = extract_pitch_contour(&path, &config).unwrap();
    assert_eq!(a.len(), CONTOUR_LEN);
    assert!((compare_pitch(&a, &b).unwrap() - 100.0).abs() < 1e-6);
}

#[test]
fn different_durations_align() {
    let tmp = tempfile::tempdir().unwrap();
    let slow = tmp.path().join("slow.wav");
    let fast = tmp.path().join("fast.wav");
    // Same melody, one recited twice as fast and at another sample rate.
    write_glide(&slow, 120.0, 240.0, 6.0, 16000);
    write_glide(&fast, 120.0, 240.0, 3.0, 22050);

    let config = PitchConfig::default();
    let a = extract_pitch_contour(&slow, &config).unwrap();
    let b = extract_pitch_contour(&fast, &config).unwrap();
    assert_eq!(a.len(), b.len());
    let score = compare_pitch(&a, &b).unwrap();
    // The first centred frame sees mostly padding, so the edges differ a little.
    assert!(score > 85.0, "score {score}");
}

#[test]
fn opposite_melodies_score_low() {
    let tmp = tempfile::tempdir().unwrap();
    let up = tmp.path().join("up.wav");
    let down = tmp.path().join("down.wav");
    write_glide(&up, 120.0, 240.0, 2.0, 16000);
    write_glide(&down, 240.0, 120.0, 2.0, 16000);

    let config = PitchConfig::default();
    let score = compare_pitch(
        &extract_pitch_contour(&up, &config).unwrap(),
        &extract_pitch_contour(&down, &config).unwrap(),
    )
    .unwrap();
    assert!(score < 0.0, "score {score}");
}

#[test]
fn silence_has_undefined_similarity() {
    let tmp = tempfile::tempdir().unwrap();
    let tone = tmp.path().join("tone.wav");
    let silence = tmp.path().join("silence.wav");
    write_glide(&tone, 150.0, 200.0, 1.0, 16000);
    audio::write_wav(&silence, &AudioBuffer::new(vec![0.0; 16000], 16000, 1)).unwrap();

    let config = PitchConfig::default();
    let err = compare_pitch(
        &extract_pitch_contour(&tone, &config).unwrap(),
        &extract_pitch_contour(&silence, &config).unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, RecitationError::UndefinedSimilarity(_)));
}

#[test]
fn missing_file_is_input_missing() {
    let err = extract_pitch_contour("/no/such/recording.m4a", &PitchConfig::default()).unwrap_err();
    assert!(matches!(err, RecitationError::InputMissing(_)));
}
