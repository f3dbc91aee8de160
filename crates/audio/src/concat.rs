//! WAV output and container-aware concatenation.
//!
//! Compressed containers cannot be joined by appending bytes, so every input
//! is decoded to PCM, brought to a common rate and written out as one WAV.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use recite_core::{AudioBuffer, RecitationError, RecitationResult};
use tracing::info;

use crate::loader::load_mono;

/// Write an interleaved buffer as 16-bit PCM WAV.
pub fn write_wav(path: impl AsRef<Path>, buffer: &AudioBuffer) -> RecitationResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let spec = WavSpec {
        channels: buffer.channels as u16,
        sample_rate: buffer.sample_rate as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| RecitationError::Io(std::io::Error::other(format!("create WAV: {e}"))))?;
    for &s in &buffer.samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer
            .write_sample(v)
            .map_err(|e| RecitationError::Io(std::io::Error::other(format!("write WAV: {e}"))))?;
    }
    writer
        .finalize()
        .map_err(|e| RecitationError::Io(std::io::Error::other(format!("finalize WAV: {e}"))))?;
    Ok(())
}

/// Decode every input, resample to `sample_rate` mono and write them back to
/// back into `destination`. Returns the duration of the result in seconds.
pub fn concat_to_wav<P: AsRef<Path>>(
    inputs: &[P],
    destination: impl AsRef<Path>,
    sample_rate: usize,
) -> RecitationResult<f32> {
    if inputs.is_empty() {
        return Err(RecitationError::InputMissing(
            "nothing to concatenate".to_string(),
        ));
    }

    let mut joined = Vec::new();
    for input in inputs {
        let mono = load_mono(input, sample_rate)?;
        joined.extend_from_slice(&mono.samples);
    }

    let buffer = AudioBuffer::new(joined, sample_rate, 1);
    write_wav(&destination, &buffer)?;
    info!(
        "concatenated {} recordings into {} ({:.2}s)",
        inputs.len(),
        destination.as_ref().display(),
        buffer.duration()
    );
    Ok(buffer.duration())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_audio;

    #[test]
    fn concat_mixed_rates_produces_valid_wav() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("1_1.wav");
        let b = tmp.path().join("1_2.wav");
        write_wav(&a, &AudioBuffer::new(vec![0.2; 16000], 16000, 1)).unwrap();
        // 0.5 s stereo at 22.05 kHz
        write_wav(&b, &AudioBuffer::new(vec![-0.2; 22050], 22050, 2)).unwrap();

        let out = tmp.path().join("group.wav");
        let duration = concat_to_wav(&[&a, &b], &out, 16000).unwrap();
        assert!((duration - 1.5).abs() < 0.01, "duration {duration}");

        let decoded = load_audio(&out).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 24000);
        assert!(decoded.samples[100] > 0.1);
        assert!(decoded.samples[20000] < -0.1);
    }

    #[test]
    fn concat_requires_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let empty: [&Path; 0] = [];
        let err = concat_to_wav(&empty, tmp.path().join("x.wav"), 16000).unwrap_err();
        assert!(matches!(err, RecitationError::InputMissing(_)));
    }

    #[test]
    fn concat_missing_input_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = concat_to_wav(&[tmp.path().join("nope.m4a")], tmp.path().join("x.wav"), 16000)
            .unwrap_err();
        assert!(matches!(err, RecitationError::InputMissing(_)));
    }
}
