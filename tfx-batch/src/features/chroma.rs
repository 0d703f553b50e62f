//! Chroma filterbank over the STFT power spectrum
//!
//! Each FFT bin contributes to the 12 pitch classes through a Gaussian bump
//! centered on its (fractional) semitone position, weighted by a wide
//! Gaussian over octaves centered on octave 5. Tuning is fixed at A440 and
//! the first pitch class is C.

use std::f64::consts::LN_2;

/// Pitch classes per octave
pub const N_CHROMA: usize = 12;

const CENTER_OCTAVE: f64 = 5.0;
const OCTAVE_WIDTH: f64 = 2.0;
/// A440 expressed as the A0 reference of the octave scale
const A0_HZ: f64 = 440.0 / 16.0;

/// Dense `N_CHROMA x n_bins` projection matrix
#[derive(Debug, Clone)]
pub struct ChromaFilterbank {
    weights: Vec<Vec<f64>>,
}

impl ChromaFilterbank {
    pub fn new(sample_rate: f64, n_fft: usize) -> Self {
        let n_bins = n_fft / 2 + 1;
        let chroma = N_CHROMA as f64;

        // Semitone position of every bin plus one beyond, DC extrapolated
        let mut positions: Vec<f64> = (1..=n_bins)
            .map(|k| {
                let freq = k as f64 * sample_rate / n_fft as f64;
                chroma * (freq / A0_HZ).ln() / LN_2
            })
            .collect();
        positions.insert(0, positions[0] - 1.5 * chroma);

        let widths: Vec<f64> = positions
            .windows(2)
            .map(|w| (w[1] - w[0]).max(1.0))
            .collect();

        let half = (chroma / 2.0).round();
        let mut columns: Vec<[f64; N_CHROMA]> = Vec::with_capacity(n_bins);
        for bin in 0..n_bins {
            let position = positions[bin];
            let mut column = [0.0; N_CHROMA];
            for (c, weight) in column.iter_mut().enumerate() {
                let distance = (position - c as f64 + half + 10.0 * chroma).rem_euclid(chroma) - half;
                *weight = (-0.5 * (2.0 * distance / widths[bin]).powi(2)).exp();
            }

            let norm = column.iter().map(|w| w * w).sum::<f64>().sqrt();
            let octave_weight =
                (-0.5 * ((position / chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
            for weight in column.iter_mut() {
                if norm > f64::MIN_POSITIVE {
                    *weight /= norm;
                }
                *weight *= octave_weight;
            }
            columns.push(column);
        }

        // Rotate so pitch class 0 is C rather than A
        let weights = (0..N_CHROMA)
            .map(|c| columns.iter().map(|col| col[(c + 3) % N_CHROMA]).collect())
            .collect();

        Self { weights }
    }

    /// Project one power spectrum frame onto the pitch classes
    pub fn apply(&self, power: &[f64], out: &mut [f64; N_CHROMA]) {
        for (row, slot) in self.weights.iter().zip(out.iter_mut()) {
            *slot = row.iter().zip(power).map(|(w, p)| w * p).sum();
        }
    }
}

/// Running time average of max-normalized chroma frames
#[derive(Debug, Clone)]
pub struct ChromaAccumulator {
    filterbank: ChromaFilterbank,
    frame: [f64; N_CHROMA],
    sum: [f64; N_CHROMA],
    frames: usize,
}

impl ChromaAccumulator {
    pub fn new(filterbank: ChromaFilterbank) -> Self {
        Self {
            filterbank,
            frame: [0.0; N_CHROMA],
            sum: [0.0; N_CHROMA],
            frames: 0,
        }
    }

    pub fn push_frame(&mut self, power: &[f64]) {
        self.filterbank.apply(power, &mut self.frame);

        let peak = self.frame.iter().copied().fold(0.0, f64::max);
        // Near-silent frames are left unnormalized
        let scale = if peak > f64::MIN_POSITIVE { peak } else { 1.0 };
        for (acc, value) in self.sum.iter_mut().zip(self.frame.iter()) {
            *acc += value / scale;
        }
        self.frames += 1;
    }

    pub fn finish(self) -> Vec<f64> {
        let frames = self.frames.max(1) as f64;
        self.sum.iter().map(|v| v / frames).collect()
    }
}
