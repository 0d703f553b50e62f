//! Global tempo estimation
//!
//! **Algorithm:**
//! 1. Onset strength: positive frame-to-frame change of the dB mel
//!    spectrogram, averaged over mel bands
//! 2. Tempogram: Hann-windowed autocorrelation of the onset envelope over a
//!    sliding 8-second window (hop of one frame), each frame normalized to
//!    its peak, then averaged over time
//! 3. Score every lag with a log-normal prior around 120 BPM and pick the
//!    single best period

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::stft::hann_window;

/// Autocorrelation window length in seconds
const AC_SIZE_SECS: f64 = 8.0;
/// Center of the tempo prior
const START_BPM: f64 = 120.0;
/// Width of the tempo prior in octaves
const STD_BPM: f64 = 1.0;
/// Periods faster than this are never selected
const MAX_TEMPO: f64 = 320.0;
/// Onset lag in frames
const ONSET_LAG: usize = 1;

/// Onset strength envelope from a frame-major dB mel spectrogram
///
/// The envelope is shifted right so that onsets line up with the centered
/// STFT frames, and has exactly one value per frame.
pub fn onset_envelope(mel_db: &[f32], n_mels: usize, n_fft: usize, hop_length: usize) -> Vec<f64> {
    let n_frames = if n_mels == 0 { 0 } else { mel_db.len() / n_mels };
    let pad = ONSET_LAG + n_fft / (2 * hop_length);

    let mut envelope = vec![0.0; n_frames];
    for t in ONSET_LAG..n_frames {
        let slot = t + pad - ONSET_LAG;
        if slot >= n_frames {
            break;
        }
        let current = &mel_db[t * n_mels..(t + 1) * n_mels];
        let previous = &mel_db[(t - ONSET_LAG) * n_mels..(t - ONSET_LAG + 1) * n_mels];
        let flux: f64 = current
            .iter()
            .zip(previous)
            .map(|(c, p)| (*c as f64 - *p as f64).max(0.0))
            .sum();
        envelope[slot] = flux / n_mels as f64;
    }

    envelope
}

/// Estimate a single tempo in BPM from an onset envelope
///
/// Returns `None` if the envelope is empty.
pub fn estimate_tempo(envelope: &[f64], sample_rate: f64, hop_length: usize) -> Option<f64> {
    if envelope.is_empty() {
        return None;
    }

    let win_length = ((AC_SIZE_SECS * sample_rate / hop_length as f64).floor() as usize).max(2);
    let tempogram = mean_tempogram(envelope, win_length);

    let frames_per_minute = 60.0 * sample_rate / hop_length as f64;
    let best = (1..win_length)
        .map(|lag| (lag, frames_per_minute / lag as f64))
        .filter(|(_, bpm)| *bpm < MAX_TEMPO)
        .map(|(lag, bpm)| {
            let prior = -0.5 * ((bpm.log2() - START_BPM.log2()) / STD_BPM).powi(2);
            (bpm, (1e6 * tempogram[lag]).ln_1p() + prior)
        })
        .fold(None, |best: Option<(f64, f64)>, (bpm, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((bpm, score)),
        });

    best.map(|(bpm, _)| bpm)
}

/// Time-averaged, per-frame peak-normalized autocorrelation tempogram
fn mean_tempogram(envelope: &[f64], win_length: usize) -> Vec<f64> {
    let n = envelope.len();
    let half = win_length / 2;
    let padded = linear_ramp_pad(envelope, half);
    let window = hann_window(win_length);

    let fft_len = (2 * win_length - 1).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(fft_len);
    let inverse = planner.plan_fft_inverse(fft_len);
    let mut buffer = vec![Complex::new(0.0, 0.0); fft_len];

    let mut sum = vec![0.0; win_length];
    for start in 0..n {
        for (i, slot) in buffer.iter_mut().enumerate() {
            let value = if i < win_length {
                padded.get(start + i).copied().unwrap_or(0.0) * window[i]
            } else {
                0.0
            };
            *slot = Complex::new(value, 0.0);
        }

        forward.process(&mut buffer);
        for bin in buffer.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        inverse.process(&mut buffer);

        let scale = buffer[..win_length]
            .iter()
            .map(|c| c.re.abs())
            .fold(0.0, f64::max);
        if scale > f64::MIN_POSITIVE {
            for (acc, c) in sum.iter_mut().zip(buffer.iter()) {
                *acc += c.re / scale;
            }
        }
    }

    sum.iter().map(|v| v / n as f64).collect()
}

/// Pad both ends with linear ramps from zero up to the edge values
fn linear_ramp_pad(values: &[f64], pad: usize) -> Vec<f64> {
    let (first, last) = match (values.first(), values.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return vec![0.0; 2 * pad],
    };

    let mut padded = Vec::with_capacity(values.len() + 2 * pad);
    padded.extend((0..pad).map(|i| first * i as f64 / pad as f64));
    padded.extend_from_slice(values);
    padded.extend((0..pad).map(|j| last * (pad - 1 - j) as f64 / pad as f64));
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Onset envelope with an impulse every `period` frames
    fn pulse_envelope(frames: usize, period: usize) -> Vec<f64> {
        (0..frames)
            .map(|t| if t % period == 0 { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn test_linear_ramp_pad_shape() {
        let padded = linear_ramp_pad(&[2.0, 4.0], 2);
        assert_eq!(padded, vec![0.0, 1.0, 2.0, 4.0, 2.0, 0.0]);
    }

    #[test]
    fn test_onset_envelope_marks_rising_frames() {
        // 2 mel bands, 6 frames, energy jumps at frame 2
        let mel_db: Vec<f32> = vec![
            -60.0, -60.0, -60.0, -60.0, -10.0, -10.0, -10.0, -10.0, -10.0, -10.0, -10.0, -10.0,
        ];
        let envelope = onset_envelope(&mel_db, 2, 2048, 512);
        assert_eq!(envelope.len(), 6);
        // Flux of frame 2 lands 2 frames later
        assert!((envelope[4] - 50.0).abs() < 1e-9);
        assert_eq!(envelope.iter().filter(|v| **v > 0.0).count(), 1);
    }

    #[test]
    fn test_pulse_train_tempo() {
        let sample_rate = 22_050.0;
        let hop = 512;
        // One beat every 22 frames, just under 120 BPM
        let envelope = pulse_envelope(1200, 22);
        let expected = 60.0 * sample_rate / (hop as f64 * 22.0);

        let tempo = estimate_tempo(&envelope, sample_rate, hop).unwrap();
        assert!((tempo - expected).abs() < 1e-6, "tempo {}", tempo);
    }

    #[test]
    fn test_empty_envelope_has_no_tempo() {
        assert!(estimate_tempo(&[], 22_050.0, 512).is_none());
    }

    #[test]
    fn test_silent_envelope_tempo_is_finite() {
        let tempo = estimate_tempo(&vec![0.0; 500], 22_050.0, 512).unwrap();
        assert!(tempo.is_finite());
        assert!(tempo < MAX_TEMPO);
    }
}
