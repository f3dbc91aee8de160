//! Whisper against a real checkpoint. Skipped unless `models/whisper-*` or
//! `RECITE_WHISPER_DIR` points at one.

use std::path::PathBuf;

use candle_core::Device;
use model_whisper::{WhisperLoader, WhisperModel};
use recite_core::{RecognizerLoader, SpeechRecognizer, TranscribeOptions};

fn get_model_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("RECITE_WHISPER_DIR") {
        return Some(PathBuf::from(dir));
    }
    let models = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()?
        .parent()?
        .join("models");
    ["whisper-small", "whisper-base", "whisper-tiny"]
        .iter()
        .map(|name| models.join(name))
        .find(|path| path.join("config.json").exists())
}

#[test]
fn test_silence_gives_empty_or_short_text() {
    let Some(model_path) = get_model_path() else {
        eprintln!("Skipping test: Whisper model not found");
        return;
    };

    let mut model = WhisperModel::load(&model_path, &Device::Cpu).expect("load whisper");
    let options = TranscribeOptions::default().with_language("he");
    let result = model.transcribe(&vec![0.0; 16000 * 2], &options).unwrap();

    eprintln!("silence -> {:?} (RTF {:.2})", result.text, result.rtf);
    assert!(result.text.chars().count() < 40);
    assert_eq!(result.language.as_deref(), Some("he"));
    assert!((result.audio_duration_secs - 2.0).abs() < 1e-6);
}

#[test]
fn test_loader_reports_model() {
    let Some(model_path) = get_model_path() else {
        eprintln!("Skipping test: Whisper model not found");
        return;
    };

    let loader = WhisperLoader::new(&model_path);
    assert!(loader.describe().contains("whisper"));
    let recognizer = loader.load().expect("load whisper");
    let info = recognizer.info();
    assert!(!info.quantized);
    assert!(info.backend.starts_with("candle"));
    assert_eq!(recognizer.sample_rate(), 16_000);
}
