//! Декодер Whisper: greedy + temperature fallback.

use std::collections::HashSet;

use candle_core::{IndexOp, Tensor};
use rand::distributions::Distribution;
use rand::SeedableRng;
use tokenizers::Tokenizer;

use recite_core::{RecitationError, RecitationResult};

/// Температуры, перебираемые по порядку, пока окно не декодируется чисто.
const FALLBACK_TEMPERATURES: [f64; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];
const COMPRESSION_RATIO_THRESHOLD: f64 = 2.4;
const LOGPROB_THRESHOLD: f64 = -1.0;
const NO_SPEECH_THRESHOLD: f64 = 0.6;

/// Специальные токены, нужные декодеру.
#[derive(Debug, Clone, Copy)]
pub struct SpecialTokens {
    pub sot: u32,
    pub eot: u32,
    pub transcribe: u32,
    pub no_speech: u32,
    pub no_timestamps: u32,
}

impl SpecialTokens {
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> RecitationResult<Self> {
        let tok = |s: &str| {
            tokenizer.token_to_id(s).ok_or_else(|| {
                RecitationError::ModelUnavailable(format!("special token {s} not in tokenizer"))
            })
        };
        // В старых чекпойнтах токен называется <|nocaptions|>.
        let no_speech = tok("<|nospeech|>").or_else(|_| tok("<|nocaptions|>"))?;
        Ok(Self {
            sot: tok("<|startoftranscript|>")?,
            eot: tok("<|endoftext|>")?,
            transcribe: tok("<|transcribe|>")?,
            no_speech,
            no_timestamps: tok("<|notimestamps|>")?,
        })
    }
}

/// Результат декодирования одного 30-секундного окна.
#[derive(Debug, Clone)]
pub struct WindowDecoding {
    /// Сгенерированные токены (без промпта).
    pub tokens: Vec<u32>,
    pub avg_logprob: f64,
    pub no_speech_prob: f64,
    pub temperature: f64,
    pub compression_ratio: f64,
}

impl WindowDecoding {
    /// Правило тишины Whisper: уверенное "нет речи" и слабая транскрипция.
    pub fn is_silence(&self) -> bool {
        self.no_speech_prob > NO_SPEECH_THRESHOLD && self.avg_logprob < LOGPROB_THRESHOLD
    }

    fn is_acceptable(&self) -> bool {
        self.compression_ratio < COMPRESSION_RATIO_THRESHOLD && self.avg_logprob > LOGPROB_THRESHOLD
    }
}

/// Состояние декодера для одного окна.
pub struct WindowDecoder {
    rng: rand::rngs::StdRng,
    suppress_tokens: Tensor,
    tokens: SpecialTokens,
    language_token: Option<u32>,
}

impl WindowDecoder {
    pub fn new(
        tokens: SpecialTokens,
        language_token: Option<u32>,
        suppress_tokens: Tensor,
        seed: u64,
    ) -> Self {
        Self {
            rng: rand::rngs::StdRng::seed_from_u64(seed),
            suppress_tokens,
            tokens,
            language_token,
        }
    }

    /// `<|startoftranscript|> [<|lang|>] <|transcribe|> <|notimestamps|>`
    pub fn prompt(&self) -> Vec<u32> {
        let mut prompt = vec![self.tokens.sot];
        prompt.extend(self.language_token);
        prompt.push(self.tokens.transcribe);
        prompt.push(self.tokens.no_timestamps);
        prompt
    }

    /// Декодировать одно окно при фиксированной температуре.
    ///
    /// `forward` отображает `(tokens [1, n], audio_features, flush)` в логиты
    /// `[1, n, vocab]`.
    pub fn decode<F>(
        &mut self,
        audio_features: &Tensor,
        max_tokens: usize,
        temperature: f64,
        mut forward: F,
    ) -> candle_core::Result<WindowDecoding>
    where
        F: FnMut(&Tensor, &Tensor, bool) -> candle_core::Result<Tensor>,
    {
        let device = audio_features.device();
        let mut tokens = self.prompt();
        let prompt_len = tokens.len();
        let mut sum_logprob = 0f64;
        let mut no_speech_prob = f64::NAN;

        for step in 0..max_tokens {
            let input = Tensor::new(tokens.as_slice(), device)?.unsqueeze(0)?;
            let logits = forward(&input, audio_features, step == 0)?;
            let (_, seq_len, _) = logits.dims3()?;
            let logits = logits.i((0, seq_len - 1))?;

            if step == 0 {
                let probs = candle_nn::ops::softmax(&logits, 0)?;
                no_speech_prob =
                    probs.i(self.tokens.no_speech as usize)?.to_scalar::<f32>()? as f64;
            }

            let blocked = Tensor::new(&[f32::NEG_INFINITY], device)?
                .broadcast_as(self.suppress_tokens.shape())?;
            let logits = logits.scatter_add(&self.suppress_tokens, &blocked, 0)?;

            let next = if temperature > 0.0 {
                self.sample(&logits, temperature)?
            } else {
                logits.argmax(0)?.to_scalar::<u32>()?
            };

            let logprobs = candle_nn::ops::log_softmax(&logits, 0)?;
            sum_logprob += logprobs.i(next as usize)?.to_scalar::<f32>()? as f64;

            if next == self.tokens.eot {
                break;
            }
            tokens.push(next);
        }

        let generated = tokens.split_off(prompt_len);
        let avg_logprob = sum_logprob / generated.len().max(1) as f64;
        let compression_ratio = repetition_ratio(&generated);
        Ok(WindowDecoding {
            tokens: generated,
            avg_logprob,
            no_speech_prob,
            temperature,
            compression_ratio,
        })
    }

    /// Декодировать, повышая температуру, пока вывод выглядит вырожденным.
    /// Если ни одна попытка не прошла, возвращается последняя.
    pub fn decode_with_fallback<F>(
        &mut self,
        audio_features: &Tensor,
        max_tokens: usize,
        mut forward: F,
    ) -> candle_core::Result<WindowDecoding>
    where
        F: FnMut(&Tensor, &Tensor, bool) -> candle_core::Result<Tensor>,
    {
        let mut last = None;
        for &t in &FALLBACK_TEMPERATURES {
            let attempt = self.decode(audio_features, max_tokens, t, &mut forward)?;
            if attempt.is_acceptable() || attempt.is_silence() {
                return Ok(attempt);
            }
            tracing::debug!(
                "окно отклонено при T={t}: compression={:.2} logprob={:.2}",
                attempt.compression_ratio,
                attempt.avg_logprob
            );
            last = Some(attempt);
        }
        last.ok_or_else(|| candle_core::Error::Msg("no decoding temperatures".to_string()))
    }

    fn sample(&mut self, logits: &Tensor, temperature: f64) -> candle_core::Result<u32> {
        let probs = candle_nn::ops::softmax(&(logits / temperature)?, 0)?;
        let weights: Vec<f32> = probs.to_vec1()?;
        let dist =
            rand::distributions::WeightedIndex::new(&weights).map_err(candle_core::Error::wrap)?;
        Ok(dist.sample(&mut self.rng) as u32)
    }
}

/// Замена gzip compression ratio: токенов на уникальную биграмму.
/// Зацикленный вывод повторяет биграммы и получает высокий балл.
fn repetition_ratio(tokens: &[u32]) -> f64 {
    if tokens.len() < 2 {
        return 1.0;
    }
    let distinct: HashSet<(u32, u32)> = tokens.windows(2).map(|w| (w[0], w[1])).collect();
    (tokens.len() - 1) as f64 / distinct.len() as f64
}
