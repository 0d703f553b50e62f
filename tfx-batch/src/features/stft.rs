//! Short-Time Fourier Transform over a mono waveform
//!
//! Frames are centered: the signal is zero-padded by `n_fft / 2` on both
//! sides, so frame `t` covers samples `[t * hop - n_fft/2, t * hop + n_fft/2)`.
//! Frames are produced one at a time and handed to a visitor, so the full
//! complex spectrogram is never held in memory.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// STFT configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StftConfig {
    /// FFT size (window size in samples)
    pub n_fft: usize,
    /// Hop length (stride between windows in samples)
    pub hop_length: usize,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
        }
    }
}

impl StftConfig {
    /// Number of non-negative frequency bins (`n_fft / 2 + 1`)
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of centered frames produced for `n_samples` input samples
    pub fn frame_count(&self, n_samples: usize) -> usize {
        1 + n_samples / self.hop_length
    }

    /// Center frequency in Hz of every FFT bin
    pub fn bin_frequencies(&self, sample_rate: f64) -> Vec<f64> {
        (0..self.n_bins())
            .map(|k| k as f64 * sample_rate / self.n_fft as f64)
            .collect()
    }
}

/// Periodic Hann window (raised cosine)
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

/// Reusable forward STFT with a planned FFT and preallocated buffers
pub struct Stft {
    config: StftConfig,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
}

impl Stft {
    pub fn new(config: StftConfig) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(config.n_fft);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            window: hann_window(config.n_fft),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); config.n_fft],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; config.n_bins()],
            config,
        }
    }

    pub fn config(&self) -> &StftConfig {
        &self.config
    }

    /// Compute the magnitude spectrum of every frame and pass it to `visit`
    ///
    /// The slice handed to `visit` has `n_bins()` entries and is only valid
    /// for the duration of the call.
    pub fn for_each_magnitude_frame<F>(&mut self, samples: &[f32], mut visit: F)
    where
        F: FnMut(usize, &[f64]),
    {
        let n_fft = self.config.n_fft;
        let half = (n_fft / 2) as isize;
        let n_frames = self.config.frame_count(samples.len());

        for frame in 0..n_frames {
            let start = (frame * self.config.hop_length) as isize - half;

            for (i, slot) in self.buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize] as f64
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.fft
                .process_with_scratch(&mut self.buffer, &mut self.scratch);

            for (mag, bin) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
                *mag = bin.norm();
            }

            visit(frame, &self.magnitudes);
        }
    }
}
