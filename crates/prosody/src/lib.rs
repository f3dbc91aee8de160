//! # prosody
//!
//! Melody of a recitation: YIN pitch tracking, a fixed-length contour per
//! recording, a scale-free similarity between two contours and a chart of
//! both.
//!
//! ```ignore
//! use prosody::{compare_pitch, extract_pitch_contour};
//! use recite_core::PitchConfig;
//!
//! let config = PitchConfig::default();
//! let reference = extract_pitch_contour("1_1.m4a", &config)?;
//! let candidate = extract_pitch_contour("attempt.wav", &config)?;
//! println!("{:.2}", compare_pitch(&reference, &candidate)?);
//! ```

pub mod contour;
pub mod plot;
pub mod similarity;
pub mod yin;

pub use contour::{extract_pitch_contour, extract_pitch_contour_from_samples, normalize_length};
pub use plot::plot_pitch;
pub use similarity::compare_pitch;
