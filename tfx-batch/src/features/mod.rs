//! Feature extraction backend
//!
//! Computes a fixed-shape [`FeatureVector`] from a local audio artifact:
//! tempo, 13 MFCCs, octave-band spectral contrast, and 12-bin chroma, each
//! averaged over the full waveform at its native sample rate.
//!
//! All spectral features share one STFT pass (n_fft 2048, hop 512). The
//! only per-frame state kept for the whole file is the mel power matrix,
//! which MFCC and onset strength both need after the global dB ceiling is
//! known.

pub mod chroma;
pub mod contrast;
pub mod mel;
pub mod stft;
pub mod tempo;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{FeatureVector, CHROMA_BINS, MFCC_COEFFICIENTS};
use crate::utils::audio_decoder::decode_audio_file;
use chroma::{ChromaAccumulator, ChromaFilterbank};
use contrast::{SpectralContrast, CONTRAST_OCTAVES};
use mel::{dct_ortho, power_to_db, top_db_floor, MelFilterbank, N_MELS};
use stft::{Stft, StftConfig};

/// Feature extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Artifact could not be opened or decoded
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Artifact decoded to zero samples
    #[error("No audio samples in {0}")]
    EmptyAudio(PathBuf),

    /// Analysis could not run on this signal
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Backend returned a vector of the wrong arity
    #[error("{feature} has {actual} values, expected {expected}")]
    Shape {
        feature: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Backend returned NaN or infinity
    #[error("{feature} contains non-finite values")]
    NonFinite { feature: &'static str },

    /// Blocking analysis task panicked or was cancelled
    #[error("Analysis task failed: {0}")]
    Join(String),
}

/// Feature extraction backend
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Spectral contrast width this backend always produces
    fn contrast_bands(&self) -> usize;

    /// Compute the feature vector of one audio artifact
    async fn extract(&self, audio_path: &Path) -> Result<FeatureVector, ExtractionError>;
}

/// Fixed analysis parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParams {
    pub stft: StftConfig,
    pub n_mels: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            stft: StftConfig::default(),
            n_mels: N_MELS,
        }
    }
}

/// Native DSP feature extractor (symphonia decode + rustfft analysis)
#[derive(Debug, Clone, Default)]
pub struct SpectralFeatureExtractor {
    params: AnalysisParams,
}

impl SpectralFeatureExtractor {
    pub fn new(params: AnalysisParams) -> Self {
        Self { params }
    }
}

#[async_trait]
impl FeatureExtractor for SpectralFeatureExtractor {
    fn contrast_bands(&self) -> usize {
        CONTRAST_OCTAVES + 1
    }

    async fn extract(&self, audio_path: &Path) -> Result<FeatureVector, ExtractionError> {
        let path = audio_path.to_path_buf();
        let params = self.params;

        // Decode + STFT are CPU-bound; keep them off the async workers
        tokio::task::spawn_blocking(move || {
            let decoded = decode_audio_file(&path).map_err(|e| ExtractionError::Decode {
                path: path.clone(),
                message: format!("{:#}", e),
            })?;

            if decoded.samples.is_empty() {
                return Err(ExtractionError::EmptyAudio(path));
            }

            tracing::debug!(
                path = %path.display(),
                sample_rate = decoded.sample_rate,
                duration_seconds = format!("{:.1}", decoded.duration_seconds),
                "Extracting features"
            );

            analyze(&decoded.samples, decoded.sample_rate, &params)
        })
        .await
        .map_err(|e| ExtractionError::Join(e.to_string()))?
    }
}

/// Compute all features of a mono waveform
///
/// # Errors
/// Fails on an empty signal, a sample rate too low for the contrast bands,
/// or any non-finite result.
pub fn analyze(
    samples: &[f32],
    sample_rate: u32,
    params: &AnalysisParams,
) -> Result<FeatureVector, ExtractionError> {
    if samples.is_empty() {
        return Err(ExtractionError::Analysis("empty signal".to_string()));
    }

    let sr = sample_rate as f64;
    let config = params.stft;
    let bin_freqs = config.bin_frequencies(sr);
    let n_frames = config.frame_count(samples.len());

    let mel_bank = MelFilterbank::new(sr, params.n_mels, &bin_freqs);
    let mut contrast = SpectralContrast::new(sr, &bin_freqs)?;
    let mut chroma = ChromaAccumulator::new(ChromaFilterbank::new(sr, config.n_fft));

    let n_mels = mel_bank.n_mels();
    let mut mel_power: Vec<f32> = Vec::with_capacity(n_frames * n_mels);
    let mut power = vec![0.0; config.n_bins()];
    let mut mel_frame = vec![0.0; n_mels];

    let mut stft = Stft::new(config);
    stft.for_each_magnitude_frame(samples, |_, magnitudes| {
        for (p, m) in power.iter_mut().zip(magnitudes) {
            *p = m * m;
        }
        mel_bank.apply(&power, &mut mel_frame);
        mel_power.extend(mel_frame.iter().map(|&v| v as f32));
        contrast.push_frame(magnitudes);
        chroma.push_frame(&power);
    });

    // Power to dB in place, clamped below the loudest cell of the file
    let mut max_db = f32::NEG_INFINITY;
    for value in mel_power.iter_mut() {
        *value = power_to_db(*value as f64) as f32;
        max_db = max_db.max(*value);
    }
    let floor = top_db_floor(max_db as f64) as f32;
    for value in mel_power.iter_mut() {
        *value = value.max(floor);
    }

    let mut band_means = vec![0.0f64; n_mels];
    for frame in mel_power.chunks_exact(n_mels) {
        for (mean, value) in band_means.iter_mut().zip(frame) {
            *mean += *value as f64;
        }
    }
    let frames = (mel_power.len() / n_mels.max(1)).max(1) as f64;
    for mean in band_means.iter_mut() {
        *mean /= frames;
    }
    // The DCT is linear, so the mean of per-frame MFCCs is the DCT of the mean
    let mfcc = dct_ortho(&band_means, MFCC_COEFFICIENTS);

    let envelope = tempo::onset_envelope(&mel_power, n_mels, config.n_fft, config.hop_length);
    let tempo_bpm = tempo::estimate_tempo(&envelope, sr, config.hop_length)
        .ok_or_else(|| ExtractionError::Analysis("no onset frames".to_string()))?;

    let vector = FeatureVector {
        tempo_bpm,
        mfcc,
        spectral_contrast: contrast.finish(),
        chroma_stft: chroma.finish(),
    };

    validate_feature_vector(&vector, CONTRAST_OCTAVES + 1)?;
    Ok(vector)
}

/// Enforce fixed arities and finite values on a backend result
pub fn validate_feature_vector(
    vector: &FeatureVector,
    contrast_bands: usize,
) -> Result<(), ExtractionError> {
    let checks: [(&'static str, &[f64], usize); 3] = [
        ("mfcc", &vector.mfcc, MFCC_COEFFICIENTS),
        ("spectral_contrast", &vector.spectral_contrast, contrast_bands),
        ("chroma_stft", &vector.chroma_stft, CHROMA_BINS),
    ];

    for (feature, values, expected) in checks {
        if values.len() != expected {
            return Err(ExtractionError::Shape {
                feature,
                expected,
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ExtractionError::NonFinite { feature });
        }
    }

    if !vector.tempo_bpm.is_finite() {
        return Err(ExtractionError::NonFinite { feature: "tempo" });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: u32, seconds: f64) -> Vec<f32> {
        let n = (sample_rate as f64 * seconds) as usize;
        (0..n)
            .map(|i| (0.5 * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()) as f32)
            .collect()
    }

    #[test]
    fn test_analyze_shapes() {
        let vector = analyze(&sine(440.0, 22_050, 3.0), 22_050, &AnalysisParams::default()).unwrap();
        assert_eq!(vector.mfcc.len(), MFCC_COEFFICIENTS);
        assert_eq!(vector.spectral_contrast.len(), 7);
        assert_eq!(vector.chroma_stft.len(), CHROMA_BINS);
        assert!(vector.tempo_bpm > 0.0);
    }

    #[test]
    fn test_analyze_silence_is_finite() {
        let vector = analyze(&vec![0.0; 22_050], 22_050, &AnalysisParams::default()).unwrap();
        assert!(vector.mfcc.iter().all(|v| v.is_finite()));
        assert!(vector.spectral_contrast.iter().all(|v| v.is_finite()));
        assert!(vector.chroma_stft.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_analyze_rejects_empty_signal() {
        assert!(matches!(
            analyze(&[], 22_050, &AnalysisParams::default()),
            Err(ExtractionError::Analysis(_))
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_arity() {
        let vector = FeatureVector {
            tempo_bpm: 120.0,
            mfcc: vec![0.0; 12],
            spectral_contrast: vec![0.0; 7],
            chroma_stft: vec![0.0; 12],
        };
        assert!(matches!(
            validate_feature_vector(&vector, 7),
            Err(ExtractionError::Shape {
                feature: "mfcc",
                expected: 13,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let vector = FeatureVector {
            tempo_bpm: 120.0,
            mfcc: vec![0.0; 13],
            spectral_contrast: vec![f64::NAN; 7],
            chroma_stft: vec![0.0; 12],
        };
        assert!(matches!(
            validate_feature_vector(&vector, 7),
            Err(ExtractionError::NonFinite {
                feature: "spectral_contrast"
            })
        ));
    }
}
