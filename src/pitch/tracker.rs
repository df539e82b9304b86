// Pitch tracker abstraction
// Frame-wise f0 estimation backends produce a FrequencyContour

use thiserror::Error;

/// Errors raised while estimating a frequency contour
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Invalid tracker configuration: {0}")]
    InvalidConfig(String),

    #[error("FFT failed: {0}")]
    Fft(String),
}

/// Per-frame fundamental frequency estimates.
///
/// Frame `i` sits at `i * hop_size / sample_rate` seconds. Values `<= 0.0`
/// mark unvoiced frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyContour {
    pub frequencies: Vec<f32>,
    pub sample_rate: u32,
    pub hop_size: usize,
}

impl FrequencyContour {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Time of frame `index` in seconds
    pub fn frame_time_secs(&self, index: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (index * self.hop_size) as f64 / self.sample_rate as f64
    }

    pub fn voiced_frames(&self) -> usize {
        self.frequencies.iter().filter(|&&hz| hz > 0.0).count()
    }
}

/// A monophonic f0 estimator
pub trait PitchTracker {
    /// Estimate one frequency per hop over a mono buffer
    fn track(&self, samples: &[f32], sample_rate: u32) -> Result<FrequencyContour, TrackerError>;

    /// Samples between output frames
    fn hop_size(&self) -> usize;
}
