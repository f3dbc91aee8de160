//! # recite-pipeline
//!
//! Сквозное сравнение чтения с эталоном:
//!
//! 1. Распознать обе записи ([`recite_engine::Transcriber`]) и оценить
//!    фонетическое сходство текстов.
//! 2. Параллельно извлечь оба контура высоты тона и сравнить их форму.
//! 3. Нарисовать оба контура, объединить оценки и сохранить результат в
//!    [`ResultStore`].

mod library;
mod pipeline;
pub mod scoring;
mod store;

pub use library::VerseLibrary;
pub use pipeline::{ComparisonPipeline, ComparisonRequest, UNDEFINED_PROSODY_SCORE};
pub use store::ResultStore;
