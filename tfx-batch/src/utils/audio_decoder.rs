//! Audio Decoding Utilities
//!
//! **Purpose:** Decode an acquired audio artifact to mono f32 PCM samples at
//! its native sample rate.
//!
//! Uses symphonia for format-agnostic decoding (WAV, FLAC, MP3, etc.)

use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;

/// Decoded audio result
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono audio samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
    /// Duration in seconds
    pub duration_seconds: f64,
}

/// Decode audio file to mono f32 PCM samples
///
/// **Algorithm:**
/// 1. Open file and probe format using symphonia
/// 2. Find default audio track
/// 3. Decode all packets of that track
/// 4. Average channels to mono
///
/// Packets that fail to decode are skipped; any other read error aborts.
///
/// # Errors
/// * File I/O errors
/// * Unsupported format / no audio track
/// * Unreadable stream
pub fn decode_audio_file(file_path: &Path) -> Result<DecodedAudio> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    let file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open audio file: {}", file_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe audio file: {}", file_path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found in file")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate unknown")?;
    let channel_count = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .with_context(|| format!("Failed to create decoder for: {}", file_path.display()))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Error reading packet from {}: {}",
                    file_path.display(),
                    e
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => all_samples.extend(convert_to_mono_f32(&decoded)),
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(path = %file_path.display(), "Skipping corrupt packet: {}", msg);
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to decode packet in {}: {}",
                    file_path.display(),
                    e
                ));
            }
        }
    }

    let duration_seconds = all_samples.len() as f64 / sample_rate as f64;

    tracing::debug!(
        path = %file_path.display(),
        total_samples = all_samples.len(),
        sample_rate,
        channels = channel_count,
        duration_seconds = format!("{:.2}", duration_seconds),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples: all_samples,
        sample_rate,
        channels: channel_count,
        duration_seconds,
    })
}

/// Convert any symphonia buffer to mono f32 samples
fn convert_to_mono_f32(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => mix_to_mono(buf),
        AudioBufferRef::F64(buf) => mix_to_mono(buf),
        AudioBufferRef::U8(buf) => mix_to_mono(buf),
        AudioBufferRef::U16(buf) => mix_to_mono(buf),
        AudioBufferRef::U24(buf) => mix_to_mono(buf),
        AudioBufferRef::U32(buf) => mix_to_mono(buf),
        AudioBufferRef::S8(buf) => mix_to_mono(buf),
        AudioBufferRef::S16(buf) => mix_to_mono(buf),
        AudioBufferRef::S24(buf) => mix_to_mono(buf),
        AudioBufferRef::S32(buf) => mix_to_mono(buf),
    }
}

/// Average all channels of one buffer into a mono signal
fn mix_to_mono<S>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count().max(1);
    let num_frames = buf.frames();
    let mut mono = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let mut sum = 0.0f32;
        for ch in 0..num_channels {
            sum += f32::from_sample(buf.chan(ch)[frame_idx]);
        }
        mono.push(sum / num_channels as f32);
    }

    mono
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_audio_file_not_found() {
        let result = decode_audio_file(Path::new("/nonexistent/file.wav"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to open audio file"));
    }

    #[test]
    fn test_decode_garbage_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a RIFF header").unwrap();

        assert!(decode_audio_file(&path).is_err());
    }
}
