// YIN f0 estimator
// FFT-based difference function, cumulative mean normalization, absolute threshold

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::tracker::{FrequencyContour, PitchTracker, TrackerError};

/// YIN analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YinConfig {
    /// Analysis window in samples
    pub frame_size: usize,

    /// Lowest detectable f0
    pub fmin_hz: f32,

    /// Highest detectable f0
    pub fmax_hz: f32,

    /// Absolute threshold on the normalized difference function.
    /// Lower values reject more frames as unvoiced.
    pub threshold: f32,

    /// Frames quieter than this RMS are unvoiced without analysis
    pub min_rms: f32,
}

impl Default for YinConfig {
    fn default() -> Self {
        YinConfig {
            frame_size: 2048,
            fmin_hz: 55.0,
            fmax_hz: 1760.0,
            threshold: 0.2,
            min_rms: 0.005,
        }
    }
}

impl YinConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.frame_size < 4 {
            return Err(TrackerError::InvalidConfig(format!(
                "frame_size must be at least 4, got {}",
                self.frame_size
            )));
        }
        if !(self.fmin_hz > 0.0 && self.fmin_hz < self.fmax_hz) {
            return Err(TrackerError::InvalidConfig(format!(
                "frequency range {}..{} Hz is empty",
                self.fmin_hz, self.fmax_hz
            )));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Monophonic pitch tracker based on the YIN algorithm
#[derive(Debug, Clone)]
pub struct YinTracker {
    config: YinConfig,
    hop_size: usize,
}

impl Default for YinTracker {
    fn default() -> Self {
        YinTracker::new(YinConfig::default(), 128)
    }
}

impl YinTracker {
    pub fn new(config: YinConfig, hop_size: usize) -> Self {
        YinTracker { config, hop_size }
    }

    pub fn config(&self) -> &YinConfig {
        &self.config
    }

    /// Unvoiced frames prepended so each estimate lines up with its frame centre
    pub fn lead_in_frames(&self) -> usize {
        if self.hop_size == 0 {
            return 0;
        }
        self.config.frame_size / (2 * self.hop_size)
    }
}

impl PitchTracker for YinTracker {
    fn track(&self, samples: &[f32], sample_rate: u32) -> Result<FrequencyContour, TrackerError> {
        self.config.validate()?;
        if self.hop_size == 0 {
            return Err(TrackerError::InvalidConfig("hop_size must be positive".to_string()));
        }
        if sample_rate == 0 {
            return Err(TrackerError::InvalidConfig("sample rate must be positive".to_string()));
        }

        let cfg = &self.config;
        let frame_size = cfg.frame_size;
        let hop_size = self.hop_size;

        let max_tau = ((sample_rate as f32 / cfg.fmin_hz).floor() as usize).min(frame_size - 2);
        let min_tau = ((sample_rate as f32 / cfg.fmax_hz).ceil() as usize).max(2).min(max_tau);

        let total_frames = samples.len().div_ceil(hop_size);
        let lead_in = self.lead_in_frames().min(total_frames);

        let mut frequencies = Vec::with_capacity(total_frames);
        frequencies.resize(lead_in, 0.0);

        let mut difference = DifferenceFunction::new(frame_size);
        let mut frame = vec![0.0f32; frame_size];
        let mut diff = vec![0.0f32; max_tau + 1];

        for frame_idx in 0..total_frames - lead_in {
            let start = frame_idx * hop_size;
            let end = (start + frame_size).min(samples.len());
            frame.fill(0.0);
            if start < end {
                frame[..end - start].copy_from_slice(&samples[start..end]);
            }

            let rms = (frame.iter().map(|s| s * s).sum::<f32>() / frame_size as f32).sqrt();
            if rms < cfg.min_rms {
                frequencies.push(0.0);
                continue;
            }

            difference.compute(&frame, &mut diff)?;
            let cmnd = cumulative_mean_normalized_difference(&diff);

            let hz = refined_period(&cmnd, min_tau, max_tau, cfg.threshold)
                .filter(|&tau| tau > 0.0)
                .map(|tau| sample_rate as f32 / tau)
                .unwrap_or(0.0);
            frequencies.push(hz);
        }

        Ok(FrequencyContour {
            frequencies,
            sample_rate,
            hop_size,
        })
    }

    fn hop_size(&self) -> usize {
        self.hop_size
    }
}

/// Reusable FFT plans and buffers for the YIN difference function
struct DifferenceFunction {
    fft_len: usize,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    time: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    prefix_sq: Vec<f32>,
}

impl DifferenceFunction {
    fn new(frame_size: usize) -> Self {
        let fft_len = (frame_size * 2).next_power_of_two();
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let time = forward.make_input_vec();
        let spectrum = forward.make_output_vec();

        DifferenceFunction {
            fft_len,
            forward,
            inverse,
            time,
            spectrum,
            prefix_sq: vec![0.0; frame_size + 1],
        }
    }

    /// d(τ) = Σ x_j² + Σ x_{j+τ}² - 2·r(τ) over j in 0..N-τ, autocorrelation via FFT.
    /// Fills `diff[0..]` (d(0) is always 0).
    fn compute(&mut self, frame: &[f32], diff: &mut [f32]) -> Result<(), TrackerError> {
        let n = frame.len();

        self.time.fill(0.0);
        self.time[..n].copy_from_slice(frame);
        self.forward
            .process(&mut self.time, &mut self.spectrum)
            .map_err(|e| TrackerError::Fft(e.to_string()))?;

        for value in self.spectrum.iter_mut() {
            *value = Complex::new(value.norm_sqr(), 0.0);
        }
        self.inverse
            .process(&mut self.spectrum, &mut self.time)
            .map_err(|e| TrackerError::Fft(e.to_string()))?;

        for (idx, &sample) in frame.iter().enumerate() {
            self.prefix_sq[idx + 1] = self.prefix_sq[idx] + sample * sample;
        }

        let scale = 1.0 / self.fft_len as f32;
        diff[0] = 0.0;
        for tau in 1..diff.len().min(n) {
            let sum_head = self.prefix_sq[n - tau];
            let sum_tail = self.prefix_sq[n] - self.prefix_sq[tau];
            let autocorr = self.time[tau] * scale;
            diff[tau] = (sum_head + sum_tail - 2.0 * autocorr).max(0.0);
        }

        Ok(())
    }
}

/// d'(τ) = d(τ) / ((1/τ) * Σ_{j=1..τ} d(j)), with d'(0) = 1
fn cumulative_mean_normalized_difference(diff: &[f32]) -> Vec<f32> {
    let mut cmnd = vec![1.0; diff.len()];
    let mut running_sum = 0.0;
    for tau in 1..diff.len() {
        running_sum += diff[tau];
        if running_sum > 0.0 {
            cmnd[tau] = diff[tau] * tau as f32 / running_sum;
        }
    }
    cmnd
}

/// Period of the first dip of d'(τ) below `threshold` in `min_tau..=max_tau`,
/// refined to sub-sample precision.
///
/// The search walks from the first sub-threshold lag down to the bottom of
/// that dip, then fits a parabola through the bottom and its two neighbours
/// and returns the vertex. The vertex offset is bounded to half a lag either
/// side of the integer minimum.
fn refined_period(cmnd: &[f32], min_tau: usize, max_tau: usize, threshold: f32) -> Option<f32> {
    let last = max_tau.min(cmnd.len().checked_sub(1)?);
    let mut tau = (min_tau..=last).find(|&lag| cmnd[lag] < threshold)?;
    while tau < last && cmnd[tau + 1] < cmnd[tau] {
        tau += 1;
    }

    let (Some(&left), Some(&right)) = (cmnd.get(tau.wrapping_sub(1)), cmnd.get(tau + 1)) else {
        return Some(tau as f32);
    };
    let centre = cmnd[tau];
    let curvature = left + right - 2.0 * centre;
    if curvature <= f32::EPSILON {
        return Some(tau as f32);
    }

    let offset = ((left - right) / (2.0 * curvature)).clamp(-0.5, 0.5);
    Some(tau as f32 + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, secs: f32, amplitude: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * secs) as usize;
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn median_voiced(contour: &FrequencyContour) -> f32 {
        let mut voiced: Vec<f32> = contour.frequencies.iter().copied().filter(|&hz| hz > 0.0).collect();
        assert!(!voiced.is_empty(), "no voiced frames");
        voiced.sort_by(|a, b| a.partial_cmp(b).unwrap());
        voiced[voiced.len() / 2]
    }

    #[test]
    fn test_difference_function_constant_signal() {
        let frame = vec![1.0_f32; 64];
        let mut diff = vec![1.0; 33];
        DifferenceFunction::new(64).compute(&frame, &mut diff).unwrap();
        assert!(diff.iter().all(|d| d.abs() < 1e-2), "{:?}", diff);
    }

    #[test]
    fn test_difference_function_matches_direct_sum() {
        let frame: Vec<f32> = (0..128).map(|i| ((i * 37) % 11) as f32 / 11.0 - 0.5).collect();
        let mut diff = vec![0.0; 40];
        DifferenceFunction::new(128).compute(&frame, &mut diff).unwrap();

        for tau in 1..40 {
            let direct: f32 = (0..128 - tau).map(|j| (frame[j] - frame[j + tau]).powi(2)).sum();
            assert!((diff[tau] - direct).abs() < 1e-2, "tau {}: {} vs {}", tau, diff[tau], direct);
        }
    }

    #[test]
    fn test_cmnd_flat_difference_is_one() {
        let cmnd = cumulative_mean_normalized_difference(&[0.0, 0.0, 0.0]);
        assert_eq!(cmnd, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_refined_period_finds_vertex_of_dip() {
        let cmnd: Vec<f32> = (0..12).map(|i| 0.05 + 0.01 * (i as f32 - 5.3).powi(2)).collect();
        let period = refined_period(&cmnd, 1, 11, 0.2).unwrap();
        assert!((period - 5.3).abs() < 1e-3, "period {}", period);
    }

    #[test]
    fn test_refined_period_walks_to_dip_bottom() {
        let cmnd = vec![1.0, 0.9, 0.8, 0.15, 0.1, 0.05, 0.3, 0.6];
        let period = refined_period(&cmnd, 1, 7, 0.2).unwrap();
        assert!((period - 5.0).abs() <= 0.5, "period {}", period);
        assert_eq!(refined_period(&cmnd, 1, 7, 0.01), None);
    }

    #[test]
    fn test_refined_period_at_range_edge_is_integer() {
        let cmnd = vec![1.0, 0.9, 0.5, 0.1];
        assert_eq!(refined_period(&cmnd, 1, 3, 0.2), Some(3.0));
    }

    #[test]
    fn test_tracks_a4_sine() {
        let samples = sine(440.0, 44100, 0.5, 0.5);
        let contour = YinTracker::default().track(&samples, 44100).unwrap();

        let hz = median_voiced(&contour);
        assert!((hz - 440.0).abs() < 2.0, "estimated {} Hz", hz);
    }

    #[test]
    fn test_tracks_low_sine() {
        let samples = sine(110.0, 44100, 0.5, 0.5);
        let contour = YinTracker::default().track(&samples, 44100).unwrap();

        let hz = median_voiced(&contour);
        assert!((hz - 110.0).abs() < 1.0, "estimated {} Hz", hz);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let samples = vec![0.0f32; 44100 / 4];
        let contour = YinTracker::default().track(&samples, 44100).unwrap();

        assert!(!contour.is_empty());
        assert_eq!(contour.voiced_frames(), 0);
    }

    #[test]
    fn test_contour_layout() {
        let samples = sine(440.0, 44100, 0.25, 0.5);
        let tracker = YinTracker::default();
        let contour = tracker.track(&samples, 44100).unwrap();

        assert_eq!(contour.hop_size, 128);
        assert_eq!(contour.sample_rate, 44100);
        assert_eq!(contour.len(), samples.len().div_ceil(128));

        let lead_in = tracker.lead_in_frames();
        assert_eq!(lead_in, 8);
        assert!(contour.frequencies[..lead_in].iter().all(|&hz| hz == 0.0));
    }

    #[test]
    fn test_empty_input_gives_empty_contour() {
        let contour = YinTracker::default().track(&[], 44100).unwrap();
        assert!(contour.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let tracker = YinTracker::new(YinConfig::default(), 0);
        assert!(matches!(tracker.track(&[0.0; 4096], 44100), Err(TrackerError::InvalidConfig(_))));

        let tracker = YinTracker::new(
            YinConfig {
                fmin_hz: 2000.0,
                ..YinConfig::default()
            },
            128,
        );
        assert!(tracker.track(&[0.0; 4096], 44100).is_err());
    }
}
