//! Границы между ядром сравнения и бэкендами распознавания.
//!
//! Каждый распознаватель (сейчас Whisper) реализует [`SpeechRecognizer`];
//! [`RecognizerLoader`] создаёт его по требованию, чтобы дорогая загрузка
//! откладывалась до первого использования и выполнялась ровно один раз.

use crate::error::RecitationResult;
use crate::types::{RecognizerInfo, TranscribeOptions, TranscriptionResult};

/// Единый интерфейс для моделей распознавания речи.
///
/// # Пример
/// ```ignore
/// let mut model = WhisperModel::load("models/whisper-small", &device)?;
/// let result = model.transcribe(&samples, &TranscribeOptions::default().with_language("he"))?;
/// println!("{}", result.text);
/// ```
pub trait SpeechRecognizer: Send {
    /// Имя загруженной модели (например, "whisper-small").
    fn name(&self) -> &str;

    /// Частота дискретизации, которую ожидает модель (обычно 16000).
    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn info(&self) -> RecognizerInfo;

    /// Распознать моно-сэмплы `f32` с частотой [`Self::sample_rate()`],
    /// нормализованные в [-1.0, 1.0].
    fn transcribe(
        &mut self,
        samples: &[f32],
        options: &TranscribeOptions,
    ) -> RecitationResult<TranscriptionResult>;
}

/// Создаёт распознаватель. Вызывается не больше раза на успешную загрузку.
pub trait RecognizerLoader: Send + Sync {
    /// Описание загружаемого для логов.
    fn describe(&self) -> String;

    fn load(&self) -> RecitationResult<Box<dyn SpeechRecognizer>>;
}

impl<F> RecognizerLoader for F
where
    F: Fn() -> RecitationResult<Box<dyn SpeechRecognizer>> + Send + Sync,
{
    fn describe(&self) -> String {
        "custom recognizer".to_string()
    }

    fn load(&self) -> RecitationResult<Box<dyn SpeechRecognizer>> {
        self()
    }
}
