// Tempo estimation
// Global BPM from an inter-onset-interval histogram, with fixed-tempo override

use serde::{Deserialize, Serialize};

use crate::audio::onset::{detect_onsets, Onset, OnsetConfig};

/// BPM used when the recording has too little rhythmic structure
pub const FALLBACK_BPM: f64 = 120.0;

/// Tempo estimation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoEstimate {
    /// Estimated beats per minute
    pub bpm: f64,

    /// Confidence in the estimate [0.0, 1.0]
    /// 0.0 means the fallback tempo was used
    pub confidence: f32,
}

impl TempoEstimate {
    pub fn fixed(bpm: f64) -> Self {
        TempoEstimate { bpm, confidence: 1.0 }
    }

    fn fallback() -> Self {
        TempoEstimate {
            bpm: FALLBACK_BPM,
            confidence: 0.0,
        }
    }
}

/// Configuration for tempo estimation
#[derive(Debug, Clone)]
pub struct TempoConfig {
    /// Minimum BPM to consider (typically 60)
    pub min_bpm: f64,

    /// Maximum BPM to consider (typically 180)
    pub max_bpm: f64,

    /// Number of bins for IOI histogram
    pub histogram_bins: usize,

    /// Minimum number of onsets required for estimation
    pub min_onsets: usize,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: 60.0,
            max_bpm: 180.0,
            histogram_bins: 300,
            min_onsets: 8,
        }
    }
}

/// Global tempo estimator over a mono buffer
pub trait TempoEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> TempoEstimate;
}

/// Spectral-flux onsets followed by IOI histogram analysis
#[derive(Debug, Clone, Default)]
pub struct OnsetTempoEstimator {
    pub onsets: OnsetConfig,
    pub tempo: TempoConfig,
}

impl TempoEstimator for OnsetTempoEstimator {
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> TempoEstimate {
        let onsets = detect_onsets(samples, sample_rate, &self.onsets);
        log::debug!("Detected {} onsets for tempo estimation", onsets.len());
        estimate_tempo_with_config(&onsets, &self.tempo)
    }
}

/// Always reports the same tempo (user override)
#[derive(Debug, Clone, Copy)]
pub struct FixedTempo(pub f64);

impl TempoEstimator for FixedTempo {
    fn estimate(&self, _samples: &[f32], _sample_rate: u32) -> TempoEstimate {
        TempoEstimate::fixed(self.0)
    }
}

/// Estimate tempo from onset detections
///
/// Algorithm:
/// 1. Compute inter-onset intervals (IOIs)
/// 2. Build IOI histogram (with half/double tempo votes)
/// 3. Pick strongest peak in valid BPM range
pub fn estimate_tempo(onsets: &[Onset]) -> TempoEstimate {
    estimate_tempo_with_config(onsets, &TempoConfig::default())
}

/// Estimate tempo with custom configuration
pub fn estimate_tempo_with_config(onsets: &[Onset], config: &TempoConfig) -> TempoEstimate {
    if onsets.len() < config.min_onsets
        || config.histogram_bins < 3
        || config.min_bpm <= 0.0
        || config.max_bpm <= config.min_bpm
    {
        return TempoEstimate::fallback();
    }

    let iois = compute_iois(onsets);
    if iois.is_empty() {
        return TempoEstimate::fallback();
    }

    let histogram = build_ioi_histogram(&iois, config);

    let Some((best_bin, peak_strength)) = strongest_peak(&histogram) else {
        return TempoEstimate::fallback();
    };

    let (min_interval, bin_width) = interval_axis(config);
    let beat_secs = min_interval + (best_bin as f64 + 0.5) * bin_width;
    let bpm = 60.0 / beat_secs;

    let histogram_mean = histogram.iter().sum::<f32>() / histogram.len() as f32;
    let confidence = if histogram_mean > 0.0 {
        (peak_strength / (histogram_mean * 3.0)).min(1.0)
    } else {
        0.0
    };

    TempoEstimate {
        bpm: bpm.clamp(config.min_bpm, config.max_bpm),
        confidence,
    }
}

/// Inter-onset intervals in seconds
fn compute_iois(onsets: &[Onset]) -> Vec<f64> {
    onsets
        .windows(2)
        .map(|pair| pair[1].time_secs - pair[0].time_secs)
        .filter(|&interval| interval > 0.0)
        .collect()
}

/// (shortest beat period in seconds, histogram bin width in seconds)
fn interval_axis(config: &TempoConfig) -> (f64, f64) {
    let shortest = 60.0 / config.max_bpm;
    let longest = 60.0 / config.min_bpm;
    (shortest, (longest - shortest) / config.histogram_bins as f64)
}

/// Build histogram of inter-onset intervals over the valid tempo range
fn build_ioi_histogram(iois: &[f64], config: &TempoConfig) -> Vec<f32> {
    let (shortest, bin_width) = interval_axis(config);
    let longest = 60.0 / config.min_bpm;
    let mut histogram = vec![0.0f32; config.histogram_bins];

    let mut vote = |interval: f64, weight: f32| {
        if (shortest..=longest).contains(&interval) {
            let bin = ((interval - shortest) / bin_width) as usize;
            histogram[bin.min(config.histogram_bins - 1)] += weight;
        }
    };

    for &ioi in iois {
        vote(ioi, 1.0);
        // 2:1 and 1:2 relationships get a weaker vote
        vote(ioi / 2.0, 0.5);
        vote(ioi * 2.0, 0.5);
    }

    smooth_histogram(&histogram, 3)
}

/// Smooth histogram using moving average filter
fn smooth_histogram(histogram: &[f32], window_size: usize) -> Vec<f32> {
    let half_window = window_size / 2;

    (0..histogram.len())
        .map(|i| {
            let start = i.saturating_sub(half_window);
            let end = (i + half_window + 1).min(histogram.len());
            histogram[start..end].iter().sum::<f32>() / (end - start) as f32
        })
        .collect()
}

/// Highest local maximum of the histogram, if any
fn strongest_peak(histogram: &[f32]) -> Option<(usize, f32)> {
    (1..histogram.len().saturating_sub(1))
        .filter(|&i| histogram[i] > histogram[i - 1] && histogram[i] >= histogram[i + 1])
        .map(|i| (i, histogram[i]))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
