//! Общие типы для операций сравнения.
//!
//! Базовые структуры данных, которые используют все крейты workspace:
//! аудиобуферы, транскрипции, контуры высоты тона, результаты сравнения
//! и маркеры деградированного режима.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecitationError, RecitationResult};

/// Число точек в каждом контуре высоты тона.
pub const CONTOUR_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Аудио
// ---------------------------------------------------------------------------

/// Буфер декодированного аудио.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Samples, normalized to [-1.0, 1.0], interleaved when multi-channel.
    pub samples: Vec<f32>,

    /// Sample rate in Hz.
    pub sample_rate: usize,

    /// Number of channels.
    pub channels: usize,
}

impl AudioBuffer {
    /// Создать новый аудиобуфер.
    pub fn new(samples: Vec<f32>, sample_rate: usize, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Длительность в секундах.
    pub fn duration(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate * self.channels) as f32
    }

    /// Число сэмплов на канал.
    pub fn num_samples(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels
    }
}

/// Неизменяемая ссылка на декодируемый аудиофайл.
///
/// Создаётся вызывающей стороной (загрузка или эталонная запись) до сравнения
/// и удаляется ею же после. Внутри workspace файл никто не изменяет.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRecording {
    path: PathBuf,
}

impl AudioRecording {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `InputMissing`, если файла нет.
    pub fn ensure_exists(&self) -> RecitationResult<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(RecitationError::InputMissing(format!(
                "recording not found: {}",
                self.path.display()
            )))
        }
    }
}

impl From<&Path> for AudioRecording {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for AudioRecording {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

// ---------------------------------------------------------------------------
// Транскрипция
// ---------------------------------------------------------------------------

/// Распознанный текст на заявленном языке.
///
/// Пробелы по краям обрезаны; регистр и пунктуация такие, какие вернул
/// распознаватель.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub language: String,
}

impl Transcript {
    pub fn new(text: impl AsRef<str>, language: impl Into<String>) -> Self {
        Self {
            text: text.as_ref().trim().to_string(),
            language: language.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Результат одного запуска распознавателя.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Полный распознанный текст.
    pub text: String,

    /// Время инференса в секундах.
    pub inference_time_secs: f64,

    /// Длительность аудио в секундах.
    pub audio_duration_secs: f64,

    /// Real-Time Factor (inference_time / audio_duration).
    pub rtf: f64,

    /// Имя модели, выдавшей текст.
    pub model_name: String,

    /// Заданный или определённый язык (ISO 639-1).
    pub language: Option<String>,
}

impl TranscriptionResult {
    /// Собрать результат из текста и метрик времени.
    pub fn new(
        text: String,
        model_name: String,
        inference_time_secs: f64,
        audio_duration_secs: f64,
    ) -> Self {
        let rtf = if audio_duration_secs > 0.0 {
            inference_time_secs / audio_duration_secs
        } else {
            0.0
        };
        Self {
            text,
            inference_time_secs,
            audio_duration_secs,
            rtf,
            model_name,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Опции для [`SpeechRecognizer::transcribe`](crate::traits::SpeechRecognizer::transcribe).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscribeOptions {
    /// Принудительный язык (ISO 639-1, например "he"). `None` — язык
    /// определяет модель.
    pub language: Option<String>,

    /// Максимум генерируемых токенов на 30-секундное окно.
    pub max_tokens: Option<usize>,

    /// Температура сэмплирования (0.0 = greedy с fallback).
    pub temperature: f32,
}

impl TranscribeOptions {
    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.language = Some(lang.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Метаданные загруженного распознавателя.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerInfo {
    pub name: String,
    pub parameters: Option<u64>,
    pub quantized: bool,
    pub backend: String,
}

// ---------------------------------------------------------------------------
// Высота тона
// ---------------------------------------------------------------------------

/// Нормализованный по времени ряд основной частоты, в Гц.
///
/// Всегда ровно [`CONTOUR_LEN`] точек, поэтому контуры записей разной
/// длительности сопоставляются поточечно.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchContour(Vec<f64>);

impl PitchContour {
    pub fn new(values: Vec<f64>) -> RecitationResult<Self> {
        if values.len() != CONTOUR_LEN {
            return Err(RecitationError::InvalidInput(format!(
                "pitch contour must have {CONTOUR_LEN} samples, got {}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(RecitationError::InvalidInput(
                "pitch contour contains non-finite values".into(),
            ));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.0.iter().sum::<f64>() / self.0.len() as f64
    }

    /// Стандартное отклонение (по генеральной совокупности).
    pub fn std_dev(&self) -> f64 {
        let mean = self.mean();
        let var = self.0.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.0.len() as f64;
        var.sqrt()
    }

    /// (min, max) в Гц.
    pub fn range(&self) -> (f64, f64) {
        self.0
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

// ---------------------------------------------------------------------------
// Стихи
// ---------------------------------------------------------------------------

/// Адрес эталонной записи: глава и стих.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerseId {
    pub chapter: u32,
    pub verse: u32,
}

impl VerseId {
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self { chapter, verse }
    }

    /// Имя файла в библиотеке эталонов: `<chapter>_<verse>`.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.chapter, self.verse)
    }
}

impl fmt::Display for VerseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

impl FromStr for VerseId {
    type Err = RecitationError;

    /// Принимает `1_1` и `1:1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (chapter, verse) = s
            .split_once(['_', ':'])
            .ok_or_else(|| RecitationError::InvalidInput(format!("malformed verse id: {s:?}")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| RecitationError::InvalidInput(format!("malformed verse id: {s:?}")))
        };
        Ok(Self::new(parse(chapter)?, parse(verse)?))
    }
}

// ---------------------------------------------------------------------------
// Результат сравнения
// ---------------------------------------------------------------------------

/// Почему фонетический шаг выполнен в упрощённом режиме.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradeReason {
    /// Нет орфографической таблицы для запрошенной схемы.
    ResourceUnavailable(String),
    /// Таблица не смогла транслитерировать именно этот текст.
    TransliterationFailed(String),
    /// Стороны закодированы по-разному, сравнивать нельзя.
    EncodingMismatch,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceUnavailable(s) => write!(f, "phonetic resource unavailable: {s}"),
            Self::TransliterationFailed(s) => write!(f, "transliteration failed: {s}"),
            Self::EncodingMismatch => write!(f, "primary and fallback encodings cannot be mixed"),
        }
    }
}

/// Какое представление дало фонетическую оценку.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PhoneticMode {
    /// Обе стороны транслитерированы по таблице.
    Primary,
    /// Обе стороны в упрощённой буквенной кодировке.
    Fallback { reason: DegradeReason },
    /// Сравнение фонем отклонено; сравнивались исходные тексты.
    RawText { reason: DegradeReason },
}

impl PhoneticMode {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Primary)
    }
}

/// Является ли просодическая оценка реальным сходством или заглушкой.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProsodyOutcome {
    Defined,
    /// Хотя бы у одного контура нулевая дисперсия; оценка — заглушка 0.
    Undefined,
}

/// Неизменяемая запись об одном сравнении.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub session_id: String,
    pub verse: Option<VerseId>,
    pub timestamp: DateTime<Utc>,
    pub reference_text: String,
    pub candidate_text: String,
    /// 0–100, two decimals.
    pub phonetic_score: f64,
    pub phonetic_mode: PhoneticMode,
    /// Косинусное сходство × 100, два знака, без ограничения диапазона.
    pub prosody_score: f64,
    pub prosody_outcome: ProsodyOutcome,
    pub overall_score: f64,
    pub plot_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_buffer_duration() {
        let buf = AudioBuffer::new(vec![0.0; 32000], 16000, 2);
        assert!((buf.duration() - 1.0).abs() < 1e-6);
        assert_eq!(buf.num_samples(), 16000);
    }

    #[test]
    fn transcript_is_trimmed() {
        let t = Transcript::new("  בראשית ברא \n", "he");
        assert_eq!(t.text, "בראשית ברא");
        assert_eq!(t.language, "he");
    }

    #[test]
    fn contour_requires_fixed_length() {
        assert!(PitchContour::new(vec![100.0; CONTOUR_LEN]).is_ok());
        let err = PitchContour::new(vec![100.0; 10]).unwrap_err();
        assert!(matches!(err, RecitationError::InvalidInput(_)));
        assert!(PitchContour::new(vec![f64::NAN; CONTOUR_LEN]).is_err());
    }

    #[test]
    fn contour_statistics() {
        let values: Vec<f64> = (0..CONTOUR_LEN).map(|i| if i % 2 == 0 { 100.0 } else { 200.0 }).collect();
        let c = PitchContour::new(values).unwrap();
        assert!((c.mean() - 150.0).abs() < 1e-9);
        assert!((c.std_dev() - 50.0).abs() < 1e-9);
        assert_eq!(c.range(), (100.0, 200.0));
    }

    #[test]
    fn verse_id_parsing() {
        assert_eq!("1_1".parse::<VerseId>().unwrap(), VerseId::new(1, 1));
        assert_eq!("12:7".parse::<VerseId>().unwrap(), VerseId::new(12, 7));
        assert_eq!(VerseId::new(3, 4).file_stem(), "3_4");
        assert_eq!(VerseId::new(3, 4).to_string(), "3:4");
        assert!(matches!(
            "genesis".parse::<VerseId>(),
            Err(RecitationError::InvalidInput(_))
        ));
        assert!(matches!(
            "1_x".parse::<VerseId>(),
            Err(RecitationError::InvalidInput(_))
        ));
    }

    #[test]
    fn phonetic_mode_serializes_with_reason() {
        let mode = PhoneticMode::RawText {
            reason: DegradeReason::EncodingMismatch,
        };
        let json = serde_json::to_value(&mode).unwrap();
        assert_eq!(json["mode"], "raw_text");
        assert_eq!(json["reason"]["kind"], "encoding_mismatch");
        assert!(mode.is_degraded());
        assert!(!PhoneticMode::Primary.is_degraded());
    }

    #[test]
    fn recording_existence() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.wav");
        let rec = AudioRecording::new(&path);
        assert!(matches!(rec.ensure_exists(), Err(RecitationError::InputMissing(_))));
        std::fs::write(&path, b"RIFF").unwrap();
        assert!(rec.ensure_exists().is_ok());
    }
}
