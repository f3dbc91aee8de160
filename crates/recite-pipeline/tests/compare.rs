//! End-to-end comparisons with a scripted recognizer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use phonetics::Phonetics;
use recite_core::{
    AudioBuffer, DegradeReason, PhoneticMode, ProsodyOutcome, RecitationConfig, RecitationError,
    RecitationResult, RecognizerInfo, SpeechRecognizer, TranscribeOptions, TranscriptionResult,
    VerseId,
};
use recite_engine::Transcriber;
use recite_pipeline::{ComparisonPipeline, ComparisonRequest, VerseLibrary};

/// Picks its transcript from the loudness of the input.
struct LoudnessRecognizer;

impl SpeechRecognizer for LoudnessRecognizer {
    fn name(&self) -> &str {
        "loudness"
    }

    fn info(&self) -> RecognizerInfo {
        RecognizerInfo {
            name: "loudness".into(),
            parameters: None,
            quantized: false,
            backend: "test".into(),
        }
    }

    fn transcribe(
        &mut self,
        samples: &[f32],
        _options: &TranscribeOptions,
    ) -> RecitationResult<TranscriptionResult> {
        let peak = samples.iter().fold(0f32, |m, s| m.max(s.abs()));
        let text = if peak < 1e-3 {
            ""
        } else if peak > 0.3 {
            "בראשית ברא אלהים"
        } else {
            "בראשית ברא 3"
        };
        Ok(TranscriptionResult::new(text.into(), "loudness".into(), 0.0, 0.0))
    }
}

fn write_glide(path: &Path, f_start: f64, f_end: f64, secs: f64, amplitude: f64) {
    let sr = 16000;
    let n = (secs * sr as f64) as usize;
    let mut phase = 0.0f64;
    let samples: Vec<f32> = (0..n)
        .map(|i| {
            let f = f_start + (f_end - f_start) * i as f64 / n as f64;
            phase += 2.0 * std::f64::consts::PI * f / sr as f64;
            (phase.sin() * amplitude) as f32
        })
        .collect();
    audio::write_wav(path, &AudioBuffer::new(samples, sr, 1)).unwrap();
}

fn pipeline(artifacts: &Path) -> ComparisonPipeline {
    let config = RecitationConfig {
        artifact_dir: artifacts.to_path_buf(),
        ..RecitationConfig::default()
    };
    let transcriber = Arc::new(Transcriber::from_recognizer(Box::new(LoudnessRecognizer), "he"));
    let phonetics = Arc::new(Phonetics::from_config(&config).unwrap());
    ComparisonPipeline::new(transcriber, phonetics, config)
}

fn fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let reference = dir.join("1_1.wav");
    let candidate = dir.join("attempt.wav");
    write_glide(&reference, 120.0, 220.0, 2.0, 0.5);
    write_glide(&candidate, 120.0, 220.0, 2.0, 0.5);
    (reference, candidate)
}

#[test]
fn identical_recordings_score_100() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, _) = fixtures(tmp.path());
    let pipeline = pipeline(&tmp.path().join("artifacts"));

    let result = pipeline
        .compare(ComparisonRequest::new(reference.clone(), reference).with_verse(VerseId::new(1, 1)))
        .unwrap();

    assert_eq!(result.phonetic_score, 100.0);
    assert_eq!(result.phonetic_mode, PhoneticMode::Primary);
    assert!((result.prosody_score - 100.0).abs() < 0.01);
    assert_eq!(result.prosody_outcome, ProsodyOutcome::Defined);
    assert!((result.overall_score - 100.0).abs() < 0.01);
    assert_eq!(result.verse, Some(VerseId::new(1, 1)));
    assert_eq!(result.reference_text, "בראשית ברא אלהים");

    let plot = result.plot_path.clone().unwrap();
    assert!(plot.exists());
    assert!(plot.starts_with(tmp.path().join("artifacts")));
    assert_eq!(pipeline.store().get(&result.session_id), Some(result));
}

#[test]
fn silent_candidate_gets_sentinel_prosody() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, _) = fixtures(tmp.path());
    let silence = tmp.path().join("silence.wav");
    audio::write_wav(&silence, &AudioBuffer::new(vec![0.0; 24000], 16000, 1)).unwrap();

    let result = pipeline(tmp.path())
        .compare(ComparisonRequest::new(reference, silence))
        .unwrap();

    assert_eq!(result.prosody_outcome, ProsodyOutcome::Undefined);
    assert_eq!(result.prosody_score, 0.0);
    assert_eq!(result.candidate_text, "");
    assert_eq!(result.phonetic_score, 0.0);
    assert_eq!(result.overall_score, 0.0);
}

#[test]
fn mixed_encodings_fall_back_to_raw_text() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, _) = fixtures(tmp.path());
    let quiet = tmp.path().join("quiet.wav");
    write_glide(&quiet, 120.0, 220.0, 2.0, 0.1);

    let result = pipeline(tmp.path())
        .compare(ComparisonRequest::new(reference, quiet))
        .unwrap();

    assert_eq!(
        result.phonetic_mode,
        PhoneticMode::RawText {
            reason: DegradeReason::EncodingMismatch
        }
    );
    let expected = phonetics::ratio("בראשית ברא אלהים", "בראשית ברא 3");
    assert!((result.phonetic_score - (expected * 100.0).round() / 100.0).abs() < 1e-9);
    // same melody, different loudness
    assert!(result.prosody_score > 99.0);
}

#[test]
fn missing_inputs_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures(tmp.path());
    let pipeline = pipeline(tmp.path());

    let err = pipeline
        .compare(ComparisonRequest::new(reference.clone(), tmp.path().join("gone.m4a")))
        .unwrap_err();
    assert!(matches!(err, RecitationError::InputMissing(_)));

    let err = pipeline
        .compare(ComparisonRequest::new(reference, candidate).with_session_id("  "))
        .unwrap_err();
    assert!(matches!(err, RecitationError::InputMissing(_)));
    assert!(pipeline.store().is_empty());
}

#[test]
fn verse_library_feeds_the_pipeline() {
    let tmp = tempfile::tempdir().unwrap();
    let (_, candidate) = fixtures(tmp.path());
    let library = VerseLibrary::new(tmp.path(), vec!["m4a".into(), "wav".into()]);
    let verse: VerseId = "1:1".parse().unwrap();

    let reference = library.resolve(&verse).unwrap();
    let result = pipeline(tmp.path())
        .compare(
            ComparisonRequest::new(reference.path(), candidate)
                .with_verse(verse)
                .with_session_id("session-42"),
        )
        .unwrap();

    assert_eq!(result.session_id, "session-42");
    assert_eq!(
        result.plot_path.as_deref(),
        Some(tmp.path().join("comparison_session-42.png").as_path())
    );

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["session_id"], "session-42");
    assert_eq!(json["verse"]["chapter"], 1);
    assert_eq!(json["phonetic_mode"]["mode"], "primary");
    assert_eq!(json["prosody_outcome"], "defined");
}

#[test]
fn concurrent_comparisons_share_one_pipeline() {
    let tmp = tempfile::tempdir().unwrap();
    let (reference, candidate) = fixtures(tmp.path());
    let pipeline = pipeline(tmp.path());

    std::thread::scope(|scope| {
        for i in 0..4 {
            let pipeline = &pipeline;
            let (reference, candidate) = (reference.clone(), candidate.clone());
            scope.spawn(move || {
                let id = format!("s{i}");
                let result = pipeline
                    .compare(ComparisonRequest::new(reference, candidate).with_session_id(id.clone()))
                    .unwrap();
                assert_eq!(result.session_id, id);
            });
        }
    });
    assert_eq!(pipeline.store().len(), 4);
}
