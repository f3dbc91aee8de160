//! # recite-core
//!
//! Базовые типы, трейты и определения ошибок для сравнения чтения.
//!
//! Этот крейт предоставляет фундаментальные абстракции для всех остальных
//! крейтов в workspace:
//!
//! - Общие типы данных (`AudioBuffer`, `Transcript`, `PitchContour`, `ComparisonResult`)
//! - Конфигурационные структуры (`RecitationConfig` и его секции)
//! - Унифицированная обработка ошибок через [`RecitationError`]
//! - Trait [`SpeechRecognizer`] — единый интерфейс для всех распознавателей

pub mod config;
pub mod debug;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{PitchConfig, PlotStyle, RecitationConfig, ScoreWeights, StoreConfig};
pub use error::{RecitationError, RecitationResult};
pub use traits::{RecognizerLoader, SpeechRecognizer};
pub use types::{
    AudioBuffer, AudioRecording, ComparisonResult, DegradeReason, PhoneticMode, PitchContour,
    ProsodyOutcome, RecognizerInfo, TranscribeOptions, Transcript, TranscriptionResult, VerseId,
    CONTOUR_LEN,
};
