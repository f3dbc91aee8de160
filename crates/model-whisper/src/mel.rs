//! Log-mel вход для энкодера Whisper.
//!
//! STFT и логарифмирование берутся из `candle_transformers`; модуль
//! поставляет банк фильтров: из чекпойнта или сгенерированный.

use std::path::Path;

use candle_core::{Device, Tensor};
use candle_transformers::models::whisper::{self as m, Config as WhisperConfig};
use recite_core::{RecitationError, RecitationResult};
use tracing::debug;

/// Загрузить `mel_filters.safetensors` из директории модели или построить
/// банк фильтров Slaney той же формы (`n_mels x (N_FFT / 2 + 1)`, row-major).
pub fn load_or_build_filters(model_dir: &Path, n_mels: usize) -> RecitationResult<Vec<f32>> {
    let path = model_dir.join("mel_filters.safetensors");
    if !path.exists() {
        debug!("mel_filters.safetensors не найден, генерируем {n_mels} фильтров Slaney");
        return Ok(slaney_filterbank(m::SAMPLE_RATE, m::N_FFT, n_mels));
    }

    let data = std::fs::read(&path)?;
    let tensors = safetensors::SafeTensors::deserialize(&data)
        .map_err(|e| RecitationError::ModelUnavailable(format!("bad mel_filters: {e}")))?;
    let key = format!("mel_{n_mels}");
    let view = tensors.tensor(&key).map_err(|_| {
        RecitationError::ModelUnavailable(format!("{key} missing from {}", path.display()))
    })?;
    if view.dtype() != safetensors::Dtype::F32 {
        return Err(RecitationError::ModelUnavailable(format!(
            "{key} must be f32, found {:?}",
            view.dtype()
        )));
    }

    let filters: Vec<f32> =
        Tensor::from_raw_buffer(view.data(), candle_core::DType::F32, view.shape(), &Device::Cpu)?
            .flatten_all()?
            .to_vec1()?;
    let expected = n_mels * (m::N_FFT / 2 + 1);
    if filters.len() != expected {
        return Err(RecitationError::ModelUnavailable(format!(
            "{key} has {} values, expected {expected}",
            filters.len()
        )));
    }
    Ok(filters)
}

/// Mel-фильтры в стиле Slaney с нормализацией по площади.
pub fn slaney_filterbank(sample_rate: usize, n_fft: usize, n_mels: usize) -> Vec<f32> {
    let n_freqs = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;

    let mel_max = hz_to_mel(nyquist);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filters = vec![0.0f32; n_mels * n_freqs];
    for band in 0..n_mels {
        let (lo, center, hi) = (edges[band], edges[band + 1], edges[band + 2]);
        let norm = 2.0 / (hi - lo);
        for k in 0..n_freqs {
            let f = k as f64 * sample_rate as f64 / n_fft as f64;
            let rising = (f - lo) / (center - lo);
            let falling = (hi - f) / (hi - center);
            let w = rising.min(falling).max(0.0);
            filters[band * n_freqs + k] = (w * norm) as f32;
        }
    }
    filters
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    }
}

/// Log-mel признаки одного 30-секундного окна, форма `[1, n_mels, N_FRAMES]`.
pub fn window_to_mel(
    config: &WhisperConfig,
    window: &[f32],
    filters: &[f32],
    device: &Device,
) -> RecitationResult<Tensor> {
    let mel = m::audio::pcm_to_mel(config, window, filters);
    let n_mels = config.num_mel_bins;
    let frames = mel.len() / n_mels;
    let tensor = Tensor::from_vec(mel, (1, n_mels, frames), device)?;
    // pcm_to_mel паддит за пределы окна; энкодер принимает ровно N_FRAMES.
    Ok(tensor.narrow(2, 0, frames.min(m::N_FRAMES))?)
}
