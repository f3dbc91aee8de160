//! # model-whisper
//!
//! Распознавание речи Whisper для транскрипции чтения (через candle-transformers).
//!
//! Поддерживает Whisper tiny / base / small / medium / large-v3 / large-v3-turbo,
//! включая дообученные на иврите чекпойнты, сконвертированные в safetensors.
//! Бэкенд: candle (pure Rust), веса safetensors или GGUF.

pub mod decoder;
pub mod mel;
pub mod model;

pub use model::{WhisperLoader, WhisperModel};
