//! Error types for recitation comparison.

use thiserror::Error;

/// Main error type for comparison operations.
///
/// Only the structural variants (`InputMissing`, `Decode`, `ModelUnavailable`,
/// `Inference`) stop a comparison. Phonetic degradations are not errors; they
/// travel as [`crate::DegradeReason`] values.
#[derive(Error, Debug)]
pub enum RecitationError {
    /// A required recording or identifier is absent.
    #[error("Input missing: {0}")]
    InputMissing(String),

    /// Audio file unreadable, corrupt or in an unsupported container.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Recognition or phonetic resource failed to initialize.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Recognition failed after the model was loaded.
    #[error("Inference error: {0}")]
    Inference(String),

    /// A zero-variance pitch contour makes z-score normalization undefined.
    #[error("Undefined similarity: {0}")]
    UndefinedSimilarity(String),

    /// A value violates a documented precondition (e.g. contour length).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Chart rendering failed.
    #[error("Plot error: {0}")]
    Plot(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecitationError {
    /// `true` for failures that halt a comparison and go back to the caller.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InputMissing(_) | Self::Decode(_) | Self::ModelUnavailable(_) | Self::Inference(_)
        )
    }
}

/// Result type alias for comparison operations.
pub type RecitationResult<T> = Result<T, RecitationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let e = RecitationError::Decode("probe failed: bad header".into());
        assert_eq!(e.to_string(), "Decode error: probe failed: bad header");

        let e = RecitationError::ModelUnavailable("tokenizer.json missing".into());
        assert!(e.to_string().contains("tokenizer.json missing"));
    }

    #[test]
    fn structural_classification() {
        assert!(RecitationError::InputMissing("session".into()).is_structural());
        assert!(RecitationError::Decode("x".into()).is_structural());
        assert!(RecitationError::ModelUnavailable("x".into()).is_structural());
        assert!(!RecitationError::UndefinedSimilarity("flat".into()).is_structural());
        assert!(!RecitationError::Plot("x".into()).is_structural());
    }

    #[test]
    fn io_error_converts() {
        fn open() -> RecitationResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert!(matches!(open(), Err(RecitationError::Io(_))));
    }
}
