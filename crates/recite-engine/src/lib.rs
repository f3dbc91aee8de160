//! # recite-engine
//!
//! [`Transcriber`] владеет одним распознавателем на весь процесс. Модель
//! загружается при первом использовании ровно один раз, даже если несколько
//! сравнений стартуют одновременно; вызовы к ней сериализуются.
//!
//! ```ignore
//! use recite_engine::Transcriber;
//! use model_whisper::WhisperLoader;
//!
//! let transcriber = Transcriber::new(WhisperLoader::new("models/whisper-small"), "he");
//! let transcript = transcriber.transcribe(&"recordings/1_1.m4a".into(), None)?;
//! println!("{}", transcript.text);
//! ```

mod transcriber;

pub use transcriber::Transcriber;

#[cfg(feature = "whisper")]
pub use model_whisper::WhisperLoader;
