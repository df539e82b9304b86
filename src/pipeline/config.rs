// Transcription configuration
// Analysis parameters, segmentation thresholds, and MIDI export settings

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::transcribe::PipelineError;
use crate::export::MidiExportOptions;
use crate::pitch::YinConfig;

/// Full set of knobs for one audio-to-MIDI run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    /// Analysis sample rate; input audio is resampled to this rate
    pub sample_rate: u32,

    /// Samples between pitch frames
    pub hop_size: usize,

    /// Median filter duration in seconds. Zero or negative disables smoothing.
    pub smooth_secs: f64,

    /// Shortest note kept, in seconds. Must not be negative.
    pub min_duration_secs: f64,

    /// Also drop a too-short final note (by default the last note is always kept)
    pub strict_min_duration: bool,

    /// Tempo override in BPM; estimated from the audio when absent
    pub bpm: Option<f64>,

    pub yin: YinConfig,

    pub midi: MidiExportOptions,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        TranscribeConfig {
            sample_rate: 44100,
            hop_size: 128,
            smooth_secs: 0.25,
            min_duration_secs: 0.0,
            strict_min_duration: false,
            bpm: None,
            yin: YinConfig::default(),
            midi: MidiExportOptions::default(),
        }
    }
}

impl TranscribeConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&contents).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reject parameter combinations the pipeline cannot honor
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sample_rate == 0 {
            return Err(PipelineError::InvalidParameter("sample rate must be positive".to_string()));
        }
        if self.hop_size == 0 {
            return Err(PipelineError::InvalidParameter("hop size must be positive".to_string()));
        }
        if self.smooth_secs.is_nan() {
            return Err(PipelineError::InvalidParameter("smooth must be a number".to_string()));
        }
        if !self.min_duration_secs.is_finite() || self.min_duration_secs < 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "minimum note duration must be a non-negative number of seconds, got {}",
                self.min_duration_secs
            )));
        }
        if let Some(bpm) = self.bpm {
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(PipelineError::InvalidParameter(format!(
                    "tempo must be a positive number of BPM, got {}",
                    bpm
                )));
            }
        }
        self.yin
            .validate()
            .map_err(|e| PipelineError::InvalidParameter(e.to_string()))?;
        self.midi
            .validate()
            .map_err(|e| PipelineError::InvalidParameter(e.to_string()))?;

        if self.smooth_secs < 0.0 {
            log::warn!("Negative smoothing ({}s) disables the median filter", self.smooth_secs);
        }
        Ok(())
    }
}
