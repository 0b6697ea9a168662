//! Acoustic feature extraction.
//!
//! Frames are 2048 samples with a hop of 512, centered with zero padding.
//! Each frame contributes zero-crossing rate and RMS from the raw samples and
//! spectral centroid, rolloff and 13 cepstral coefficients from a
//! Hann-windowed FFT. The vector keeps the per-frame means.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

pub const N_MFCC: usize = 13;
/// Length of the comparison vector: cepstral means plus four scalars.
pub const VECTOR_LEN: usize = N_MFCC + 4;

const N_FFT: usize = 2048;
const HOP: usize = 512;
const N_MELS: usize = 128;
const MIN_SEGMENT_SEC: f64 = 0.08;
const ROLLOFF_PERCENT: f64 = 0.85;
const TOP_DB: f64 = 80.0;

/// Summary features of one audio segment.
///
/// Field names on disk follow the stored reference profile format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub mfcc_mean: [f64; N_MFCC],
    #[serde(rename = "zcr")]
    pub zero_crossing_rate: f64,
    pub rms: f64,
    #[serde(rename = "centroid")]
    pub spectral_centroid: f64,
    #[serde(rename = "rolloff")]
    pub spectral_rolloff: f64,
    #[serde(rename = "sr")]
    pub sample_rate: u32,
    #[serde(rename = "dur_sec")]
    pub duration_sec: f64,
}

impl FeatureVector {
    /// Raw 17-dimensional vector.
    pub fn to_vector(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(VECTOR_LEN);
        v.extend_from_slice(&self.mfcc_mean);
        v.push(self.zero_crossing_rate);
        v.push(self.rms);
        v.push(self.spectral_centroid);
        v.push(self.spectral_rolloff);
        v
    }

    /// Z-scored across its own components, so overall level drops out.
    pub fn normalized(&self) -> Vec<f64> {
        let v = self.to_vector();
        let n = v.len() as f64;
        let mean = v.iter().sum::<f64>() / n;
        let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        v.iter().map(|x| (x - mean) / (std + 1e-6)).collect()
    }
}

/// Cosine similarity; 0.0 for mismatched lengths.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm_a * norm_b + 1e-9)
}

pub struct FeatureExtractor {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("n_fft", &N_FFT)
            .field("hop", &HOP)
            .finish()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(N_FFT);
        // Periodic Hann
        let window = (0..N_FFT)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / N_FFT as f64).cos())
            .collect();
        Self { fft, window }
    }

    /// Features of `audio[start_sec..end_sec]`, or `None` if the clipped
    /// segment is shorter than 80 ms.
    pub fn extract(
        &self,
        audio: &[f32],
        sample_rate: u32,
        start_sec: f64,
        end_sec: f64,
    ) -> Option<FeatureVector> {
        if sample_rate == 0 {
            return None;
        }
        let sr = f64::from(sample_rate);
        let a = (start_sec.max(0.0) * sr) as usize;
        let b = (end_sec.max(0.0) * sr) as usize;
        let segment = if b > a {
            &audio[a.min(audio.len())..b.min(audio.len())]
        } else {
            audio
        };
        if segment.len() < (MIN_SEGMENT_SEC * sr) as usize {
            return None;
        }

        let frames = self.frames(segment);
        let n_frames = frames.len() as f64;
        let freqs: Vec<f64> = (0..=N_FFT / 2)
            .map(|k| k as f64 * sr / N_FFT as f64)
            .collect();
        let mel_bank = mel_filterbank(sample_rate);

        let mut zcr_sum = 0.0;
        let mut rms_sum = 0.0;
        let mut centroid_sum = 0.0;
        let mut rolloff_sum = 0.0;
        let mut log_mels: Vec<Vec<f64>> = Vec::with_capacity(frames.len());

        for frame in &frames {
            zcr_sum += zero_crossing_rate(frame);
            rms_sum += (frame.iter().map(|x| x * x).sum::<f64>() / N_FFT as f64).sqrt();

            let magnitude = self.magnitude_spectrum(frame);
            centroid_sum += spectral_centroid(&magnitude, &freqs);
            rolloff_sum += spectral_rolloff(&magnitude, &freqs);

            let power: Vec<f64> = magnitude.iter().map(|m| m * m).collect();
            let mel: Vec<f64> = mel_bank
                .iter()
                .map(|filter| {
                    let energy: f64 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                    10.0 * energy.max(1e-10).log10()
                })
                .collect();
            log_mels.push(mel);
        }

        // Dynamic range floor over the whole segment
        let peak = log_mels
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let floor = peak - TOP_DB;

        let mut mfcc_mean = [0.0; N_MFCC];
        for mel in &mut log_mels {
            for value in mel.iter_mut() {
                *value = value.max(floor);
            }
            for (acc, c) in mfcc_mean.iter_mut().zip(dct_ortho(mel, N_MFCC)) {
                *acc += c;
            }
        }
        for c in &mut mfcc_mean {
            *c /= n_frames;
        }

        Some(FeatureVector {
            mfcc_mean,
            zero_crossing_rate: zcr_sum / n_frames,
            rms: rms_sum / n_frames,
            spectral_centroid: centroid_sum / n_frames,
            spectral_rolloff: rolloff_sum / n_frames,
            sample_rate,
            duration_sec: segment.len() as f64 / sr,
        })
    }

    /// Centered, zero-padded analysis frames.
    fn frames(&self, segment: &[f32]) -> Vec<Vec<f64>> {
        let pad = N_FFT / 2;
        let mut padded = vec![0.0f64; pad];
        padded.extend(segment.iter().map(|&s| f64::from(s)));
        padded.extend(std::iter::repeat(0.0).take(pad));

        let n_frames = 1 + (padded.len() - N_FFT) / HOP;
        (0..n_frames)
            .map(|i| padded[i * HOP..i * HOP + N_FFT].to_vec())
            .collect()
    }

    fn magnitude_spectrum(&self, frame: &[f64]) -> Vec<f64> {
        let mut buffer: Vec<Complex<f64>> = frame
            .iter()
            .zip(&self.window)
            .map(|(x, w)| Complex::new(x * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);
        buffer[..=N_FFT / 2].iter().map(|c| c.norm()).collect()
    }
}

fn zero_crossing_rate(frame: &[f64]) -> f64 {
    let crossings = frame
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

fn spectral_centroid(magnitude: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = magnitude.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    magnitude.iter().zip(freqs).map(|(m, f)| m * f).sum::<f64>() / total
}

fn spectral_rolloff(magnitude: &[f64], freqs: &[f64]) -> f64 {
    let total: f64 = magnitude.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let target = ROLLOFF_PERCENT * total;
    let mut cumulative = 0.0;
    for (m, f) in magnitude.iter().zip(freqs) {
        cumulative += m;
        if cumulative >= target {
            return *f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

fn hz_to_mel(hz: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f64.ln() / 27.0;
    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f64.ln() / 27.0;
    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * f_sp
    }
}

/// Slaney-style triangular filters with area normalization.
fn mel_filterbank(sample_rate: u32) -> Vec<Vec<f64>> {
    let sr = f64::from(sample_rate);
    let n_bins = N_FFT / 2 + 1;
    let max_mel = hz_to_mel(sr / 2.0);
    let edges: Vec<f64> = (0..N_MELS + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (N_MELS + 1) as f64))
        .collect();

    (0..N_MELS)
        .map(|m| {
            let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
            let enorm = 2.0 / (upper - lower);
            (0..n_bins)
                .map(|k| {
                    let f = k as f64 * sr / N_FFT as f64;
                    let rising = (f - lower) / (center - lower);
                    let falling = (upper - f) / (upper - center);
                    rising.min(falling).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II, first `n_out` coefficients.
fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
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
