//! Mel filterbank, decibel scaling, and cepstral transform
//!
//! The filterbank uses the Slaney mel scale (linear below 1 kHz,
//! logarithmic above) with area normalization, so every triangular filter
//! integrates to roughly the same energy.

use std::f64::consts::PI;

/// Number of mel bands analyzed before the cepstral transform
pub const N_MELS: usize = 128;

/// Floor applied before taking logarithms
const AMIN: f64 = 1e-10;

/// Dynamic range kept below the loudest cell of a matrix
const TOP_DB: f64 = 80.0;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Convert Hz to Slaney mels
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Convert Slaney mels back to Hz
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// One triangular filter, stored sparsely as a run of weights
#[derive(Debug, Clone)]
struct MelFilter {
    first_bin: usize,
    weights: Vec<f64>,
}

/// Triangular mel filterbank spanning 0 Hz to Nyquist
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    filters: Vec<MelFilter>,
}

impl MelFilterbank {
    /// Build `n_mels` filters over FFT bins at `bin_freqs` (Hz)
    pub fn new(sample_rate: f64, n_mels: usize, bin_freqs: &[f64]) -> Self {
        let mel_max = hz_to_mel(sample_rate / 2.0);
        let mel_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let filters = (0..n_mels)
            .map(|m| {
                let (lower, center, upper) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
                let enorm = 2.0 / (upper - lower);

                let dense: Vec<f64> = bin_freqs
                    .iter()
                    .map(|&f| {
                        let rising = (f - lower) / (center - lower);
                        let falling = (upper - f) / (upper - center);
                        rising.min(falling).max(0.0) * enorm
                    })
                    .collect();

                match dense.iter().position(|&w| w > 0.0) {
                    Some(first) => {
                        let last = dense.iter().rposition(|&w| w > 0.0).unwrap_or(first);
                        MelFilter {
                            first_bin: first,
                            weights: dense[first..=last].to_vec(),
                        }
                    }
                    None => MelFilter {
                        first_bin: 0,
                        weights: Vec::new(),
                    },
                }
            })
            .collect();

        Self { filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Project one power spectrum frame onto the filterbank
    pub fn apply(&self, power: &[f64], out: &mut [f64]) {
        for (filter, slot) in self.filters.iter().zip(out.iter_mut()) {
            *slot = filter
                .weights
                .iter()
                .zip(&power[filter.first_bin..])
                .map(|(w, p)| w * p)
                .sum();
        }
    }
}

/// Convert one power value to decibels (reference 1.0)
pub fn power_to_db(power: f64) -> f64 {
    10.0 * power.max(AMIN).log10()
}

/// Lower bound applied to a dB matrix whose loudest cell is `max_db`
pub fn top_db_floor(max_db: f64) -> f64 {
    max_db - TOP_DB
}

/// Orthonormal DCT-II, keeping the first `n_out` coefficients
pub fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = input.len() as f64;
    (0..n_out)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, x)| x * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}
