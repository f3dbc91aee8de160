//! Audio file decoding.

use std::fs::File;
use std::path::Path;

use recite_core::{AudioBuffer, RecitationError, RecitationResult};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::resample::Resampler;

/// Decode an audio file (WAV, MP3, M4A/AAC) into an interleaved buffer.
///
/// The container is probed from its content; the file extension is only a hint.
pub fn load_audio(path: impl AsRef<Path>) -> RecitationResult<AudioBuffer> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RecitationError::InputMissing(format!("recording not found: {}", path.display()))
        } else {
            RecitationError::Decode(format!("cannot open {}: {e}", path.display()))
        }
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| RecitationError::Decode(format!("probe failed for {}: {e}", path.display())))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| RecitationError::Decode(format!("no audio track in {}", path.display())))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| RecitationError::Decode(format!("codec init failed: {e}")))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(0) as usize;
    let mut channels = codec_params.channels.map_or(0, |c| c.count());
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(RecitationError::Decode(format!("packet read: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt frame inside an otherwise valid stream is skipped.
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("skipping undecodable packet in {}: {e}", path.display());
                continue;
            }
            Err(e) => return Err(RecitationError::Decode(format!("decode: {e}"))),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate as usize;
        channels = spec.channels.count();

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(RecitationError::Decode(format!(
            "no audio samples decoded from {}",
            path.display()
        )));
    }

    debug!(
        "decoded {}: {} Hz, {} ch, {} samples",
        path.display(),
        sample_rate,
        channels,
        samples.len()
    );

    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

/// Decode, down-mix and resample in one step.
pub fn load_mono(path: impl AsRef<Path>, sample_rate: usize) -> RecitationResult<AudioBuffer> {
    let buffer = load_audio(path)?;
    let mono = to_mono(&buffer);
    Resampler::new(sample_rate).resample(&mono)
}

/// Convert multi-channel audio to mono by averaging channels.
pub fn to_mono(buffer: &AudioBuffer) -> AudioBuffer {
    if buffer.channels == 1 {
        return buffer.clone();
    }

    let mono_samples: Vec<f32> = buffer
        .samples
        .chunks(buffer.channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect();

    AudioBuffer::new(mono_samples, buffer.sample_rate, 1)
}
