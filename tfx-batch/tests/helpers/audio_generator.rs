//! Audio Test Fixture Generator
//!
//! Synthetic WAV files with known spectral and rhythmic content

use std::path::{Path, PathBuf};

/// Configuration for a generated tone
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency: f64,
    pub amplitude: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 3.0,
            sample_rate: 22_050,
            channels: 1,
            frequency: 440.0,
            amplitude: 0.3,
        }
    }
}

fn wav_spec(sample_rate: u32, channels: u16) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(value: f64) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f64) as i16
}

/// Generate a sine tone WAV
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let mut writer = hound::WavWriter::create(path, wav_spec(config.sample_rate, config.channels))?;
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;

    for i in 0..total_samples {
        let t = i as f64 / config.sample_rate as f64;
        let sample = to_i16(config.amplitude * (2.0 * std::f64::consts::PI * config.frequency * t).sin());
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Generate a mono click track with one click every `period_samples`
///
/// Each click is a 5 ms decaying 1 kHz burst.
pub fn generate_click_track(
    path: &Path,
    sample_rate: u32,
    period_samples: usize,
    duration_seconds: f64,
) -> anyhow::Result<PathBuf> {
    let mut writer = hound::WavWriter::create(path, wav_spec(sample_rate, 1))?;
    let total_samples = (duration_seconds * sample_rate as f64) as usize;
    let click_len = (sample_rate as usize) / 200;

    for i in 0..total_samples {
        let offset = i % period_samples;
        let sample = if offset < click_len {
            let t = offset as f64 / sample_rate as f64;
            let decay = 1.0 - offset as f64 / click_len as f64;
            0.8 * decay * (2.0 * std::f64::consts::PI * 1000.0 * t).sin()
        } else {
            0.0
        };
        writer.write_sample(to_i16(sample))?;
    }

    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Generate digital silence
pub fn generate_silence(path: &Path, sample_rate: u32, duration_seconds: f64) -> anyhow::Result<PathBuf> {
    let mut writer = hound::WavWriter::create(path, wav_spec(sample_rate, 1))?;
    let total_samples = (duration_seconds * sample_rate as f64) as usize;
    for _ in 0..total_samples {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}
