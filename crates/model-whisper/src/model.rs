//! `WhisperModel`: Whisper из candle-transformers за трейтом [`SpeechRecognizer`].

use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config as WhisperConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use recite_core::{
    RecitationError, RecitationResult, RecognizerInfo, RecognizerLoader, SpeechRecognizer,
    TranscribeOptions, TranscriptionResult,
};

use crate::decoder::{SpecialTokens, WindowDecoder};
use crate::mel;

/// Полноточные или квантизированные (GGUF) веса.
enum InnerModel {
    Normal(m::model::Whisper),
    Quantized(m::quantized_model::Whisper),
}

impl InnerModel {
    fn config(&self) -> &WhisperConfig {
        match self {
            Self::Normal(m) => &m.config,
            Self::Quantized(m) => &m.config,
        }
    }

    fn encode(&mut self, mel: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Normal(m) => m.encoder.forward(mel, true),
            Self::Quantized(m) => m.encoder.forward(mel, true),
        }
    }

    fn logits(&mut self, tokens: &Tensor, xa: &Tensor, flush: bool) -> candle_core::Result<Tensor> {
        match self {
            Self::Normal(m) => {
                let hidden = m.decoder.forward(tokens, xa, flush)?;
                m.decoder.final_linear(&hidden)
            }
            Self::Quantized(m) => {
                let hidden = m.decoder.forward(tokens, xa, flush)?;
                m.decoder.final_linear(&hidden)
            }
        }
    }

    fn reset_kv_cache(&mut self) {
        match self {
            Self::Normal(m) => m.reset_kv_cache(),
            Self::Quantized(m) => m.reset_kv_cache(),
        }
    }
}

/// Распознаватель Whisper.
///
/// Ожидает директорию с `config.json`, `tokenizer.json` и либо
/// `model.safetensors`, либо `.gguf` файлом. `mel_filters.safetensors`
/// необязателен.
pub struct WhisperModel {
    model: InnerModel,
    tokenizer: Tokenizer,
    special: SpecialTokens,
    mel_filters: Vec<f32>,
    device: Device,
    model_name: String,
    quantized: bool,
}

impl WhisperModel {
    pub fn load(model_dir: impl AsRef<Path>, device: &Device) -> RecitationResult<Self> {
        Self::load_with_options(model_dir, device, false)
    }

    pub fn load_quantized(model_dir: impl AsRef<Path>, device: &Device) -> RecitationResult<Self> {
        Self::load_with_options(model_dir, device, true)
    }

    fn load_with_options(
        model_dir: impl AsRef<Path>,
        device: &Device,
        quantized: bool,
    ) -> RecitationResult<Self> {
        let model_dir = model_dir.as_ref();
        info!("Загрузка Whisper из {:?}, quantized={}", model_dir, quantized);

        let config_path = model_dir.join("config.json");
        let config_str = std::fs::read_to_string(&config_path).map_err(|e| {
            RecitationError::ModelUnavailable(format!("cannot read {}: {e}", config_path.display()))
        })?;
        let config: WhisperConfig = serde_json::from_str(&config_str)?;
        debug!("Конфигурация Whisper: {:?}", config);

        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| RecitationError::ModelUnavailable(format!("cannot load tokenizer: {e}")))?;
        let special = SpecialTokens::from_tokenizer(&tokenizer)?;
        let mel_filters = mel::load_or_build_filters(model_dir, config.num_mel_bins)?;

        let model = if quantized {
            let gguf = find_weights(model_dir, "gguf")?;
            info!("Загрузка GGUF весов из {:?}", gguf);
            let vb =
                candle_transformers::quantized_var_builder::VarBuilder::from_gguf(&gguf, device)?;
            InnerModel::Quantized(m::quantized_model::Whisper::load(&vb, config)?)
        } else {
            let weights = find_weights(model_dir, "safetensors")?;
            info!("Загрузка safetensors весов из {:?}", weights);
            // SAFETY: файл отображается в память только для чтения на всё время жизни модели.
            let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], m::DTYPE, device)? };
            InnerModel::Normal(m::model::Whisper::load(&vb, config)?)
        };

        let model_name = model_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("whisper")
            .to_string();

        info!(
            "Whisper загружена: {}, слоёв энкодера {} / декодера {}, vocab={}",
            model_name,
            model.config().encoder_layers,
            model.config().decoder_layers,
            model.config().vocab_size,
        );

        Ok(Self {
            model,
            tokenizer,
            special,
            mel_filters,
            device: device.clone(),
            model_name,
            quantized,
        })
    }

    fn language_token(&self, language: &str) -> Option<u32> {
        let token = self.tokenizer.token_to_id(&format!("<|{language}|>"));
        if token.is_none() {
            warn!("в токенайзере нет токена <|{language}|>, язык определит модель");
        }
        token
    }

    fn parameter_count(&self) -> Option<u64> {
        let config = self.model.config();
        match config.encoder_layers {
            4 => Some(39_000_000),
            6 => Some(74_000_000),
            12 => Some(244_000_000),
            24 => Some(769_000_000),
            32 if config.decoder_layers <= 4 => Some(809_000_000),
            32 => Some(1_550_000_000),
            _ => None,
        }
    }
}

/// Сначала ищем `model.<ext>`, затем любой файл `model*.<ext>`.
fn find_weights(model_dir: &Path, ext: &str) -> RecitationResult<PathBuf> {
    let canonical = model_dir.join(format!("model.{ext}"));
    if canonical.exists() {
        return Ok(canonical);
    }
    let entries = std::fs::read_dir(model_dir).map_err(|e| {
        RecitationError::ModelUnavailable(format!("cannot list {}: {e}", model_dir.display()))
    })?;
    for entry in entries {
        let path = entry?.path();
        let is_ext = path.extension().is_some_and(|e| e == ext);
        let is_model = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with("model"));
        if is_ext && (is_model || ext == "gguf") {
            return Ok(path);
        }
    }
    Err(RecitationError::ModelUnavailable(format!(
        "no .{ext} weights in {}",
        model_dir.display()
    )))
}

/// Дополнить тишиной или обрезать ровно до `len` сэмплов.
fn pad_or_trim(samples: &[f32], len: usize) -> Vec<f32> {
    let mut window = samples[..samples.len().min(len)].to_vec();
    window.resize(len, 0.0);
    window
}

impl SpeechRecognizer for WhisperModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn info(&self) -> RecognizerInfo {
        RecognizerInfo {
            name: self.model_name.clone(),
            parameters: self.parameter_count(),
            quantized: self.quantized,
            backend: format!("candle ({:?})", self.device.location()),
        }
    }

    fn transcribe(
        &mut self,
        samples: &[f32],
        options: &TranscribeOptions,
    ) -> RecitationResult<TranscriptionResult> {
        let start = Instant::now();
        let audio_duration_secs = samples.len() as f64 / self.sample_rate() as f64;

        let language_token = options
            .language
            .as_deref()
            .and_then(|lang| self.language_token(lang));
        let suppress = Tensor::new(self.model.config().suppress_tokens.as_slice(), &self.device)?;
        let max_tokens = options
            .max_tokens
            .unwrap_or(self.model.config().max_target_positions / 2);

        let mut text = String::new();
        for (idx, chunk) in samples.chunks(m::N_SAMPLES).enumerate() {
            let window = pad_or_trim(chunk, m::N_SAMPLES);
            let mel = mel::window_to_mel(self.model.config(), &window, &self.mel_filters, &self.device)?;

            self.model.reset_kv_cache();
            let features = self.model.encode(&mel)?;

            let mut decoder =
                WindowDecoder::new(self.special, language_token, suppress.clone(), 42 + idx as u64);
            let model = &mut self.model;
            let forward = |tokens: &Tensor, xa: &Tensor, flush: bool| model.logits(tokens, xa, flush);
            let decoded = if options.temperature > 0.0 {
                decoder.decode(&features, max_tokens, options.temperature as f64, forward)?
            } else {
                decoder.decode_with_fallback(&features, max_tokens, forward)?
            };

            if decoded.is_silence() {
                debug!("окно {idx}: нет речи (p={:.2})", decoded.no_speech_prob);
                continue;
            }

            let piece = self
                .tokenizer
                .decode(&decoded.tokens, true)
                .map_err(|e| RecitationError::Inference(format!("token decode failed: {e}")))?;
            let piece = piece.trim();
            if !piece.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(piece);
            }
        }

        let inference_time = start.elapsed().as_secs_f64();
        let mut result = TranscriptionResult::new(
            text,
            self.model_name.clone(),
            inference_time,
            audio_duration_secs,
        );
        if let Some(lang) = &options.language {
            result = result.with_language(lang.clone());
        }

        info!(
            "Whisper: {:.1}s аудио за {:.2}s (RTF={:.3})",
            audio_duration_secs, inference_time, result.rtf
        );
        Ok(result)
    }
}

/// Загружает [`WhisperModel`] из директории при первой необходимости.
#[derive(Debug, Clone)]
pub struct WhisperLoader {
    pub model_dir: PathBuf,
    pub quantized: bool,
    pub device: Device,
}

impl WhisperLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            quantized: false,
            device: Device::Cpu,
        }
    }

    pub fn quantized(mut self, quantized: bool) -> Self {
        self.quantized = quantized;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

impl RecognizerLoader for WhisperLoader {
    fn describe(&self) -> String {
        format!(
            "whisper at {}{}",
            self.model_dir.display(),
            if self.quantized { " (gguf)" } else { "" }
        )
    }

    fn load(&self) -> RecitationResult<Box<dyn SpeechRecognizer>> {
        if !self.model_dir.is_dir() {
            return Err(RecitationError::ModelUnavailable(format!(
                "model directory {} does not exist",
                self.model_dir.display()
            )));
        }
        let model = WhisperModel::load_with_options(&self.model_dir, &self.device, self.quantized)?;
        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_or_trim() {
        assert_eq!(pad_or_trim(&[1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(pad_or_trim(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    }

    #[test]
    fn test_missing_model_dir_is_unavailable() {
        let loader = WhisperLoader::new("/no/such/whisper-model");
        let err = loader.load().err().unwrap();
        assert!(matches!(err, RecitationError::ModelUnavailable(_)));
        assert!(err.is_structural());
    }

    #[test]
    fn test_empty_model_dir_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = WhisperLoader::new(tmp.path()).load().err().unwrap();
        assert!(matches!(err, RecitationError::ModelUnavailable(_)));
    }
}
