use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use recite_core::{
    AudioRecording, RecitationError, RecitationResult, RecognizerInfo, RecognizerLoader,
    SpeechRecognizer, TranscribeOptions, Transcript, TranscriptionResult,
};

/// Распознаватель на весь процесс, загружаемый при первом использовании.
///
/// Одновременные первые вызовы ждут одну и ту же инициализацию; ошибка
/// загрузки возвращается всем ожидающим, следующий вызов пробует снова.
pub struct Transcriber {
    loader: Box<dyn RecognizerLoader>,
    recognizer: OnceCell<Mutex<Box<dyn SpeechRecognizer>>>,
    loads: AtomicUsize,
    language: String,
    max_tokens: Option<usize>,
}

impl Transcriber {
    /// `language` — язык по умолчанию (например, "he").
    pub fn new(loader: impl RecognizerLoader + 'static, language: impl Into<String>) -> Self {
        Self {
            loader: Box::new(loader),
            recognizer: OnceCell::new(),
            loads: AtomicUsize::new(0),
            language: language.into(),
            max_tokens: None,
        }
    }

    /// Обернуть уже загруженный распознаватель.
    pub fn from_recognizer(recognizer: Box<dyn SpeechRecognizer>, language: impl Into<String>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Mutex::new(recognizer));
        Self {
            loader: Box::new(|| -> RecitationResult<Box<dyn SpeechRecognizer>> {
                Err(RecitationError::ModelUnavailable("recognizer was provided preloaded".into()))
            }),
            recognizer: cell,
            loads: AtomicUsize::new(0),
            language: language.into(),
            max_tokens: None,
        }
    }

    #[cfg(feature = "whisper")]
    pub fn whisper(
        model_dir: impl Into<std::path::PathBuf>,
        quantized: bool,
        device: candle_core::Device,
        language: impl Into<String>,
    ) -> Self {
        let loader = model_whisper::WhisperLoader::new(model_dir)
            .quantized(quantized)
            .with_device(device);
        Self::new(loader, language)
    }

    /// Ограничение числа генерируемых токенов на окно распознавателя.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_loaded(&self) -> bool {
        self.recognizer.get().is_some()
    }

    /// Число успешных загрузок (0 или 1).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Загрузить модель сейчас, а не при первой транскрипции.
    pub fn preload(&self) -> RecitationResult<RecognizerInfo> {
        let recognizer = self.recognizer()?;
        let info = recognizer.lock().info();
        Ok(info)
    }

    fn recognizer(&self) -> RecitationResult<&Mutex<Box<dyn SpeechRecognizer>>> {
        self.recognizer.get_or_try_init(|| {
            info!("Загрузка распознавателя: {}", self.loader.describe());
            let start = Instant::now();
            let recognizer = self.loader.load().map_err(|e| match e {
                RecitationError::ModelUnavailable(_) => e,
                other => RecitationError::ModelUnavailable(other.to_string()),
            })?;
            self.loads.fetch_add(1, Ordering::SeqCst);
            info!(
                "Распознаватель '{}' готов за {:.2}s",
                recognizer.name(),
                start.elapsed().as_secs_f64()
            );
            Ok(Mutex::new(recognizer))
        })
    }

    /// Распознать запись на языке `language` или языке по умолчанию.
    pub fn transcribe(
        &self,
        recording: &AudioRecording,
        language: Option<&str>,
    ) -> RecitationResult<Transcript> {
        recording.ensure_exists()?;
        let recognizer = self.recognizer()?;
        let sample_rate = recognizer.lock().sample_rate();

        let buffer = audio::load_mono(recording.path(), sample_rate as usize)?;
        debug!(
            "{}: {:.2}s при {} Hz",
            recording.path().display(),
            buffer.duration(),
            sample_rate
        );

        let language = language.unwrap_or(&self.language);
        let result = self.run(recognizer, &buffer.samples, language)?;
        if result.text.trim().is_empty() {
            warn!("пустая транскрипция для {}", recording.path().display());
        }
        Ok(Transcript::new(result.text, language))
    }

    /// Распознать моно-сэмплы, уже приведённые к частоте распознавателя.
    pub fn transcribe_samples(
        &self,
        samples: &[f32],
        language: Option<&str>,
    ) -> RecitationResult<TranscriptionResult> {
        let recognizer = self.recognizer()?;
        self.run(recognizer, samples, language.unwrap_or(&self.language))
    }

    fn run(
        &self,
        recognizer: &Mutex<Box<dyn SpeechRecognizer>>,
        samples: &[f32],
        language: &str,
    ) -> RecitationResult<TranscriptionResult> {
        let mut options = TranscribeOptions::default().with_language(language);
        if let Some(max_tokens) = self.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        recognizer
            .lock()
            .transcribe(samples, &options)
            .map_err(|e| match e {
                RecitationError::Candle(inner) => RecitationError::Inference(inner.to_string()),
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use recite_core::AudioBuffer;

    use super::*;

    struct EchoRecognizer {
        text: String,
    }

    impl SpeechRecognizer for EchoRecognizer {
        fn name(&self) -> &str {
            "echo"
        }

        fn info(&self) -> RecognizerInfo {
            RecognizerInfo {
                name: "echo".into(),
                parameters: None,
                quantized: false,
                backend: "test".into(),
            }
        }

        fn transcribe(
            &mut self,
            samples: &[f32],
            options: &TranscribeOptions,
        ) -> RecitationResult<TranscriptionResult> {
            let text = match options.max_tokens {
                Some(n) => format!("  {} ({n})  ", self.text),
                None => format!("  {}  ", self.text),
            };
            let result = TranscriptionResult::new(text, "echo".into(), 0.0, samples.len() as f64 / 16000.0);
            Ok(result.with_language(options.language.clone().unwrap_or_default()))
        }
    }

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl RecognizerLoader for CountingLoader {
        fn describe(&self) -> String {
            "counting".into()
        }

        fn load(&self) -> RecitationResult<Box<dyn SpeechRecognizer>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(Box::new(EchoRecognizer { text: "בראשית".into() }))
        }
    }

    fn write_tone(dir: &std::path::Path) -> AudioRecording {
        let path = dir.join("tone.wav");
        let samples: Vec<f32> = (0..16000)
            .map(|i| (i as f32 * 0.05).sin() * 0.3)
            .collect();
        audio::write_wav(&path, &AudioBuffer::new(samples, 16000, 1)).unwrap();
        AudioRecording::new(path)
    }

    #[test]
    fn test_lazy_load_and_trimmed_transcript() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transcriber = Transcriber::new(CountingLoader { calls: calls.clone() }, "he");
        assert!(!transcriber.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let tmp = tempfile::tempdir().unwrap();
        let recording = write_tone(tmp.path());
        let transcript = transcriber.transcribe(&recording, None).unwrap();
        assert_eq!(transcript.text, "בראשית");
        assert_eq!(transcript.language, "he");
        assert!(transcriber.is_loaded());
        assert_eq!(transcriber.load_count(), 1);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transcriber = Arc::new(Transcriber::new(CountingLoader { calls: calls.clone() }, "he"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = transcriber.clone();
                std::thread::spawn(move || t.transcribe_samples(&[0.0; 1600], None).unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().text.trim(), "בראשית");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(transcriber.load_count(), 1);
    }

    #[test]
    fn test_failed_load_is_model_unavailable_and_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let transcriber = Transcriber::new(
            move || -> RecitationResult<Box<dyn SpeechRecognizer>> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RecitationError::Io(std::io::Error::other("disk gone")))
            },
            "he",
        );

        for _ in 0..2 {
            let err = transcriber.preload().unwrap_err();
            assert!(matches!(err, RecitationError::ModelUnavailable(_)));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(!transcriber.is_loaded());
    }

    #[test]
    fn test_missing_recording_is_input_missing() {
        let transcriber = Transcriber::from_recognizer(Box::new(EchoRecognizer { text: "x".into() }), "he");
        let err = transcriber
            .transcribe(&AudioRecording::new("/no/such/file.m4a"), None)
            .unwrap_err();
        assert!(matches!(err, RecitationError::InputMissing(_)));
        assert_eq!(transcriber.load_count(), 0);
    }

    #[test]
    fn test_max_tokens_reaches_recognizer() {
        let transcriber =
            Transcriber::from_recognizer(Box::new(EchoRecognizer { text: "x".into() }), "he")
                .with_max_tokens(64);
        let result = transcriber.transcribe_samples(&[0.0; 160], None).unwrap();
        assert_eq!(result.text.trim(), "x (64)");
    }

    #[test]
    fn test_language_override() {
        let transcriber = Transcriber::from_recognizer(Box::new(EchoRecognizer { text: "x".into() }), "he");
        let result = transcriber.transcribe_samples(&[0.0; 160], Some("yi")).unwrap();
        assert_eq!(result.language.as_deref(), Some("yi"));
    }
}
