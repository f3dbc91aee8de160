//! # phonetics
//!
//! Фонетическое кодирование транскрипций и оценка сходства по нему.
//!
//! [`Phonetics`] транслитерирует текст в IPA по [`OrthographyMap`]
//! (встроенная `heb-Hebr` или CSV-файл). Текст, с которым таблица не
//! справилась, кодируется упрощённо (только буквы), и результат это помечает.
//! [`compare_phonemes`] никогда не сравнивает основную строку с упрощённой.

mod encoder;
pub mod orthography;
pub mod similarity;

pub use encoder::{PhonemeString, Phonetics};
pub use orthography::{OrthographyMap, Unmapped};
pub use similarity::{compare_phonemes, indel_distance, ratio, EncodingMismatch};
