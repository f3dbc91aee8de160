//! Audio resampling.

use recite_core::{AudioBuffer, RecitationError, RecitationResult};
use rubato::{FftFixedInOut, Resampler as RubatoResampler};

/// Audio resampler for converting sample rates.
pub struct Resampler {
    target_sample_rate: usize,
}

impl Resampler {
    /// Create a new resampler with target sample rate.
    pub fn new(target_sample_rate: usize) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> usize {
        self.target_sample_rate
    }

    /// Resample a mono buffer to the target sample rate.
    ///
    /// The output has `round(len * ratio)` samples; the FFT resampler's
    /// latency is trimmed so the signal stays aligned with the input.
    pub fn resample(&self, buffer: &AudioBuffer) -> RecitationResult<AudioBuffer> {
        if buffer.sample_rate == self.target_sample_rate {
            return Ok(buffer.clone());
        }

        if buffer.channels != 1 {
            return Err(RecitationError::Decode(
                "Resampling requires mono audio. Use to_mono() first.".to_string(),
            ));
        }

        let ratio = self.target_sample_rate as f64 / buffer.sample_rate as f64;
        let expected = (buffer.samples.len() as f64 * ratio).round() as usize;
        if expected == 0 {
            return Ok(AudioBuffer::new(Vec::new(), self.target_sample_rate, 1));
        }

        let mut resampler = FftFixedInOut::<f32>::new(
            buffer.sample_rate,
            self.target_sample_rate,
            1024,
            1, // mono
        )
        .map_err(|e| RecitationError::Decode(format!("Failed to create resampler: {e}")))?;

        let delay = resampler.output_delay();
        let mut output = Vec::with_capacity(expected + delay + 1024);

        // Chunk sizes are dictated by the resampler; the tail is zero-padded
        // and extra chunks flush the latency.
        let mut pos = 0;
        while output.len() < delay + expected {
            let need = resampler.input_frames_next();
            let mut chunk = vec![0.0_f32; need];
            if pos < buffer.samples.len() {
                let end = (pos + need).min(buffer.samples.len());
                chunk[..end - pos].copy_from_slice(&buffer.samples[pos..end]);
            }
            pos += need;

            let input_chunk = vec![chunk];
            let output_chunk = resampler
                .process(&input_chunk, None)
                .map_err(|e| RecitationError::Decode(format!("Resampling failed: {e}")))?;
            output.extend_from_slice(&output_chunk[0]);
        }

        output.drain(..delay);
        output.truncate(expected);

        Ok(AudioBuffer::new(output, self.target_sample_rate, 1))
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(16000)
    }
}
