//! Octave-band spectral contrast
//!
//! For every frame and octave band, the valley is the mean of the quietest
//! `quantile` share of bins and the peak the mean of the loudest share.
//! Contrast is the dB difference between the two, with each of the peak and
//! valley matrices clamped to 80 dB below its own loudest cell.

use super::mel::{power_to_db, top_db_floor};
use super::ExtractionError;

/// Lower edge of the first octave band
pub const CONTRAST_FMIN: f64 = 200.0;
/// Octave bands above the lowest one
pub const CONTRAST_OCTAVES: usize = 6;
/// Fraction of each band averaged into peak and valley
const QUANTILE: f64 = 0.02;

/// Bin layout of one contrast band
#[derive(Debug, Clone, PartialEq)]
struct BandLayout {
    /// First bin of the band
    start: usize,
    /// Bins sorted for peak/valley (exclusive end)
    end: usize,
    /// Bins averaged on each side
    take: usize,
}

/// Per-frame peak/valley accumulator
#[derive(Debug, Clone)]
pub struct SpectralContrast {
    bands: Vec<BandLayout>,
    peaks: Vec<Vec<f64>>,
    valleys: Vec<Vec<f64>>,
    sorted: Vec<f64>,
}

impl SpectralContrast {
    /// Lay out `CONTRAST_OCTAVES + 1` bands over FFT bins at `bin_freqs`
    ///
    /// # Errors
    /// Fails when the highest band edge reaches Nyquist or a band holds no bins.
    pub fn new(sample_rate: f64, bin_freqs: &[f64]) -> Result<Self, ExtractionError> {
        let n_bands = CONTRAST_OCTAVES;
        let highest_low_edge = CONTRAST_FMIN * 2f64.powi(n_bands as i32 - 1);
        if highest_low_edge >= sample_rate / 2.0 {
            return Err(ExtractionError::Analysis(format!(
                "Contrast band at {} Hz exceeds Nyquist for {} Hz audio",
                highest_low_edge, sample_rate
            )));
        }

        let mut edges = vec![0.0];
        edges.extend((0..=n_bands).map(|i| CONTRAST_FMIN * 2f64.powi(i as i32)));

        let mut bands = Vec::with_capacity(n_bands + 1);
        for (k, pair) in edges.windows(2).enumerate() {
            let (low, high) = (pair[0], pair[1]);
            let first = bin_freqs.iter().position(|&f| f >= low && f <= high);
            let last = bin_freqs.iter().rposition(|&f| f >= low && f <= high);
            let (first, last) = match (first, last) {
                (Some(first), Some(last)) => (first, last),
                _ => {
                    return Err(ExtractionError::Analysis(format!(
                        "Contrast band {}..{} Hz holds no frequency bins",
                        low, high
                    )))
                }
            };

            let start = if k > 0 { first.saturating_sub(1) } else { first };
            let last = if k == n_bands { bin_freqs.len() - 1 } else { last };
            let count = last - start + 1;
            // All but the top band drop their shared upper edge bin
            let end = if k < n_bands { last } else { last + 1 };
            let available = (end - start).max(1);
            let take = ((QUANTILE * count as f64).round() as usize).clamp(1, available);

            bands.push(BandLayout {
                start,
                end: end.max(start + 1),
                take,
            });
        }

        Ok(Self {
            peaks: vec![Vec::new(); bands.len()],
            valleys: vec![Vec::new(); bands.len()],
            sorted: Vec::with_capacity(bin_freqs.len()),
            bands,
        })
    }

    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    /// Record peak and valley energy of one magnitude frame
    pub fn push_frame(&mut self, magnitudes: &[f64]) {
        for (k, band) in self.bands.iter().enumerate() {
            self.sorted.clear();
            self.sorted.extend_from_slice(&magnitudes[band.start..band.end]);
            self.sorted.sort_by(|a, b| a.total_cmp(b));

            let take = band.take.min(self.sorted.len());
            let valley = self.sorted[..take].iter().sum::<f64>() / take as f64;
            let peak = self.sorted[self.sorted.len() - take..].iter().sum::<f64>() / take as f64;

            self.valleys[k].push(valley);
            self.peaks[k].push(peak);
        }
    }

    /// Time-averaged contrast per band
    pub fn finish(self) -> Vec<f64> {
        let peak_db = to_clamped_db(&self.peaks);
        let valley_db = to_clamped_db(&self.valleys);

        peak_db
            .iter()
            .zip(valley_db.iter())
            .map(|(peaks, valleys)| {
                let frames = peaks.len().max(1) as f64;
                peaks.iter().zip(valleys).map(|(p, v)| p - v).sum::<f64>() / frames
            })
            .collect()
    }
}

/// Decibel-scale a band x frame matrix, clamped below its global maximum
fn to_clamped_db(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let db: Vec<Vec<f64>> = matrix
        .iter()
        .map(|row| row.iter().map(|&v| power_to_db(v)).collect())
        .collect();
    let max_db = db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = top_db_floor(max_db);

    db.into_iter()
        .map(|row| row.into_iter().map(|v| v.max(floor)).collect())
        .collect()
}
