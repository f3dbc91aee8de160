//! Конфигурационные структуры для пайплайна сравнения.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecitationError, RecitationResult};

/// Конфигурация верхнего уровня.
///
/// У каждой секции есть значения по умолчанию, поэтому в JSON достаточно
/// указать только переопределяемые поля.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecitationConfig {
    /// Язык для распознавателя (ISO 639-1).
    pub language: String,

    /// Орфографическая схема фонетического кодировщика (например, "heb-Hebr").
    pub phonetic_scheme: String,

    /// CSV-таблица, заменяющая встроенную (необязательно).
    pub phonetic_map: Option<PathBuf>,

    /// Директория модели Whisper.
    pub model_dir: Option<PathBuf>,

    /// Директория эталонных записей вида `<chapter>_<verse>.<ext>`.
    pub library_root: Option<PathBuf>,

    /// Расширения, перебираемые по порядку при поиске эталона.
    pub audio_extensions: Vec<String>,

    /// Куда сохраняются графики.
    pub artifact_dir: PathBuf,

    pub pitch: PitchConfig,
    pub weights: ScoreWeights,
    pub store: StoreConfig,
    pub plot: PlotStyle,
}

impl Default for RecitationConfig {
    fn default() -> Self {
        Self {
            language: "he".to_string(),
            phonetic_scheme: "heb-Hebr".to_string(),
            phonetic_map: None,
            model_dir: None,
            library_root: None,
            audio_extensions: vec!["m4a".into(), "mp3".into(), "wav".into()],
            artifact_dir: std::env::temp_dir().join("recite"),
            pitch: PitchConfig::default(),
            weights: ScoreWeights::default(),
            store: StoreConfig::default(),
            plot: PlotStyle::default(),
        }
    }
}

impl RecitationConfig {
    /// Загрузить из JSON-файла.
    pub fn from_file(path: impl AsRef<Path>) -> RecitationResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            RecitationError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RecitationResult<()> {
        self.pitch.validate()?;
        if self.store.capacity == 0 {
            return Err(RecitationError::Config("store.capacity must be > 0".into()));
        }
        if self.audio_extensions.is_empty() {
            return Err(RecitationError::Config("audio_extensions must not be empty".into()));
        }
        Ok(())
    }
}

/// Параметры трекинга высоты тона.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Частота анализа в Гц.
    pub sample_rate: usize,

    /// Длина кадра YIN в сэмплах.
    pub frame_length: usize,

    /// Шаг между кадрами в сэмплах.
    pub hop_length: usize,

    /// Минимальная допустимая f0 в Гц.
    pub fmin: f64,

    /// Максимальная допустимая f0 в Гц.
    pub fmax: f64,

    /// Абсолютный порог для cumulative mean normalized difference.
    pub trough_threshold: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_length: 2048,
            hop_length: 512,
            fmin: 50.0,
            fmax: 400.0,
            trough_threshold: 0.1,
        }
    }
}

impl PitchConfig {
    /// Окно разностной функции (половина кадра).
    pub fn win_length(&self) -> usize {
        self.frame_length / 2
    }

    /// Минимальный проверяемый лаг в сэмплах.
    pub fn min_period(&self) -> usize {
        ((self.sample_rate as f64 / self.fmax).floor() as usize).max(1)
    }

    /// Максимальный проверяемый лаг в сэмплах.
    pub fn max_period(&self) -> usize {
        ((self.sample_rate as f64 / self.fmin).ceil() as usize).min(self.win_length() - 1)
    }

    pub fn validate(&self) -> RecitationResult<()> {
        if self.fmin <= 0.0 || self.fmax <= self.fmin {
            return Err(RecitationError::Config(format!(
                "invalid pitch range {}..{} Hz",
                self.fmin, self.fmax
            )));
        }
        if self.sample_rate == 0 || self.hop_length == 0 || self.frame_length < 4 {
            return Err(RecitationError::Config("invalid pitch framing".into()));
        }
        if self.sample_rate as f64 / self.fmin >= self.win_length() as f64 {
            return Err(RecitationError::Config(format!(
                "frame_length {} too short for fmin {} Hz",
                self.frame_length, self.fmin
            )));
        }
        Ok(())
    }
}

/// Веса итоговой оценки.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub phonetic: f64,
    pub prosody: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            phonetic: 0.6,
            prosody: 0.4,
        }
    }
}

/// Ограничения хранилища результатов.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl_secs: 3600,
        }
    }
}

/// Оформление графика сравнения высоты тона.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,

    /// TrueType-шрифт для подписей. Если не задан, ищем в системных путях.
    pub font_path: Option<PathBuf>,

    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub reference_label: String,
    pub candidate_label: String,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 400,
            font_path: None,
            title: "Pitch contour comparison".to_string(),
            x_label: "Time (normalized)".to_string(),
            y_label: "Pitch (Hz)".to_string(),
            reference_label: "Reference".to_string(),
            candidate_label: "Candidate".to_string(),
        }
    }
}
