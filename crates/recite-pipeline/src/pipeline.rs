//! Сравнение одного чтения с эталоном.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use phonetics::Phonetics;
use prosody::{compare_pitch, extract_pitch_contour, plot_pitch};
use recite_core::{
    debug as diag, AudioRecording, ComparisonResult, PitchContour, ProsodyOutcome,
    RecitationConfig, RecitationError, RecitationResult, VerseId,
};
use recite_engine::Transcriber;
use tracing::{debug, info, warn};

use crate::scoring::{aggregate, phonetic_score, round2};
use crate::store::ResultStore;

/// Просодическая оценка, когда сходство не определено.
pub const UNDEFINED_PROSODY_SCORE: f64 = 0.0;

/// Входные данные одного сравнения.
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub reference: AudioRecording,
    pub candidate: AudioRecording,
    /// Переопределяет язык пайплайна.
    pub language: Option<String>,
    /// Генерируется, если не задан.
    pub session_id: Option<String>,
    pub verse: Option<VerseId>,
}

impl ComparisonRequest {
    pub fn new(reference: impl Into<AudioRecording>, candidate: impl Into<AudioRecording>) -> Self {
        Self {
            reference: reference.into(),
            candidate: candidate.into(),
            language: None,
            session_id: None,
            verse: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_verse(mut self, verse: VerseId) -> Self {
        self.verse = Some(verse);
        self
    }
}

/// Сравнивает чтение ученика с эталонной записью.
///
/// Распознаватель и фонетический кодировщик — общие сервисные объекты;
/// сам пайплайн не хранит состояния запроса и работает из нескольких потоков.
pub struct ComparisonPipeline {
    transcriber: Arc<Transcriber>,
    phonetics: Arc<Phonetics>,
    store: Arc<ResultStore>,
    config: RecitationConfig,
}

impl ComparisonPipeline {
    pub fn new(
        transcriber: Arc<Transcriber>,
        phonetics: Arc<Phonetics>,
        config: RecitationConfig,
    ) -> Self {
        let store = Arc::new(ResultStore::from_config(&config.store));
        Self {
            transcriber,
            phonetics,
            store,
            config,
        }
    }

    /// Использовать общее хранилище результатов с другими пайплайнами.
    pub fn with_store(mut self, store: Arc<ResultStore>) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn config(&self) -> &RecitationConfig {
        &self.config
    }

    pub fn compare(&self, request: ComparisonRequest) -> RecitationResult<ComparisonResult> {
        let start = Instant::now();
        let session_id = match request.session_id {
            Some(id) if id.trim().is_empty() => {
                return Err(RecitationError::InputMissing("empty session id".into()))
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };
        request.reference.ensure_exists()?;
        request.candidate.ensure_exists()?;
        let language = request.language.as_deref().unwrap_or(&self.config.language);
        info!(
            "[{session_id}] сравнение {} с {}",
            request.candidate.path().display(),
            request.reference.path().display()
        );

        let (texts, contours) = std::thread::scope(|scope| {
            let pitch = scope.spawn(|| self.contours(&request.reference, &request.candidate));
            let texts = self.transcripts(&request.reference, &request.candidate, language);
            let contours = pitch
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (texts, contours)
        });
        let (reference_text, candidate_text) = texts?;
        let (reference_contour, candidate_contour) = contours?;

        let (phonetic, phonetic_mode) =
            phonetic_score(&self.phonetics, &reference_text, &candidate_text);
        if phonetic_mode.is_degraded() {
            warn!("[{session_id}] фонетическая оценка в упрощённом режиме: {phonetic_mode:?}");
        }

        let (prosody, prosody_outcome) = match compare_pitch(&reference_contour, &candidate_contour) {
            Ok(score) => (score, ProsodyOutcome::Defined),
            Err(e) if e.is_structural() => return Err(e),
            Err(e) => {
                warn!("[{session_id}] просодия не определена ({e}), оценка {UNDEFINED_PROSODY_SCORE}");
                (UNDEFINED_PROSODY_SCORE, ProsodyOutcome::Undefined)
            }
        };

        let plot_path = self.render_plot(&session_id, &reference_contour, &candidate_contour);
        let overall = aggregate(&self.config.weights, phonetic, prosody);

        let result = ComparisonResult {
            session_id,
            verse: request.verse,
            timestamp: Utc::now(),
            reference_text,
            candidate_text,
            phonetic_score: round2(phonetic),
            phonetic_mode,
            prosody_score: round2(prosody),
            prosody_outcome,
            overall_score: round2(overall),
            plot_path,
        };
        info!(
            "[{}] phonetic={:.2} prosody={:.2} overall={:.2} за {:.2}s",
            result.session_id,
            result.phonetic_score,
            result.prosody_score,
            result.overall_score,
            start.elapsed().as_secs_f64()
        );

        self.store.insert(result.clone());
        Ok(result)
    }

    fn transcripts(
        &self,
        reference: &AudioRecording,
        candidate: &AudioRecording,
        language: &str,
    ) -> RecitationResult<(String, String)> {
        let reference = self.transcriber.transcribe(reference, Some(language))?;
        let candidate = self.transcriber.transcribe(candidate, Some(language))?;
        debug!("reference: {:?} / candidate: {:?}", reference.text, candidate.text);
        Ok((reference.text, candidate.text))
    }

    fn contours(
        &self,
        reference: &AudioRecording,
        candidate: &AudioRecording,
    ) -> RecitationResult<(PitchContour, PitchContour)> {
        let reference = extract_pitch_contour(reference.path(), &self.config.pitch)?;
        let candidate = extract_pitch_contour(candidate.path(), &self.config.pitch)?;
        if diag::enabled() {
            for (name, c) in [("reference", &reference), ("candidate", &candidate)] {
                let (lo, hi) = c.range();
                debug!(
                    "контур {name}: mean={:.1}Hz std={:.1}Hz range={:.1}..{:.1}Hz",
                    c.mean(),
                    c.std_dev(),
                    lo,
                    hi
                );
            }
        }
        Ok((reference, candidate))
    }

    fn render_plot(
        &self,
        session_id: &str,
        reference: &PitchContour,
        candidate: &PitchContour,
    ) -> Option<PathBuf> {
        let path = self
            .config
            .artifact_dir
            .join(format!("comparison_{}.png", file_safe(session_id)));
        match plot_pitch(reference, candidate, &path, &self.config.plot) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("[{session_id}] график не построен: {e}");
                None
            }
        }
    }
}

/// Id сессии приходит извне; оставляем только символы, безопасные для имён файлов.
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
