//! # audio
//!
//! Audio processing for the comparison pipeline.
//!
//! This crate handles:
//! - Decoding WAV, MP3 and M4A/AAC files into normalized `f32` samples
//! - Down-mixing to mono and resampling to the analysis rate (16kHz)
//! - Writing WAV files and concatenating recordings into one playable file

pub mod concat;
pub mod loader;
pub mod resample;

pub use concat::{concat_to_wav, write_wav};
pub use loader::{load_audio, load_mono, to_mono};
pub use resample::Resampler;
