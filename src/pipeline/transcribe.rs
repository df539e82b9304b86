// Transcription pipeline
// load -> extract -> convert -> segment -> save, strictly in sequence

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::config::TranscribeConfig;
use super::trace::{PipelineStage, TraceEntry, TraceWriter};
use crate::audio::{self, AudioError, MonoAudio};
use crate::export::{self, MidiError};
use crate::groove::{FixedTempo, OnsetTempoEstimator, TempoEstimate, TempoEstimator};
use crate::pitch::{
    frequencies_to_pitches, segment_notes, smooth_pitches, FrequencyContour, Note, PitchTracker,
    SegmentConfig, TrackerError, YinTracker,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to load config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Input error: {0}")]
    Input(#[from] AudioError),

    #[error("Pitch analysis failed: {0}")]
    Analysis(#[from] TrackerError),

    #[error("MIDI encoding failed: {0}")]
    Encode(#[from] MidiError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Process exit code for this failure class
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::InvalidParameter(_) | PipelineError::Config { .. } => 1,
            PipelineError::Input(_) => 2,
            PipelineError::Analysis(_) | PipelineError::Encode(_) => 3,
            PipelineError::Write { .. } => 4,
        }
    }
}

/// Result of one transcription run
#[derive(Debug, Clone, Serialize)]
pub struct Transcription {
    pub notes: Vec<Note>,

    /// Sample rate the analysis ran at
    pub sample_rate: u32,

    pub tempo_bpm: f64,
}

/// Runs the audio-to-MIDI pipeline with pluggable pitch and tempo backends
pub struct Transcriber {
    config: TranscribeConfig,
    tracker: Box<dyn PitchTracker>,
    tempo: Box<dyn TempoEstimator>,
    trace: Option<TraceWriter>,
}

impl Transcriber {
    /// Build a transcriber with the YIN tracker and either the fixed tempo
    /// override or onset-based tempo estimation
    pub fn new(config: TranscribeConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let tracker = YinTracker::new(config.yin.clone(), config.hop_size);
        let tempo: Box<dyn TempoEstimator> = match config.bpm {
            Some(bpm) => Box::new(FixedTempo(bpm)),
            None => Box::new(OnsetTempoEstimator::default()),
        };

        Ok(Transcriber {
            config,
            tracker: Box::new(tracker),
            tempo,
            trace: None,
        })
    }

    pub fn with_tracker(mut self, tracker: impl PitchTracker + 'static) -> Self {
        self.tracker = Box::new(tracker);
        self
    }

    pub fn with_tempo_estimator(mut self, tempo: impl TempoEstimator + 'static) -> Self {
        self.tempo = Box::new(tempo);
        self
    }

    pub fn with_trace(mut self, writer: TraceWriter) -> Self {
        self.trace = Some(writer);
        self
    }

    pub fn config(&self) -> &TranscribeConfig {
        &self.config
    }

    /// Convert, smooth and segment a frequency contour into notes.
    ///
    /// Timing comes from the contour's own sample rate and hop size.
    pub fn notes_from_contour(&self, contour: &FrequencyContour) -> Vec<Note> {
        log::info!("Converting Hz to MIDI notes...");
        self.record(TraceEntry::started(PipelineStage::Convert, "Converting Hz to MIDI notes"));

        let pitches = frequencies_to_pitches(&contour.frequencies);
        let smoothed = smooth_pitches(
            &pitches,
            contour.sample_rate,
            contour.hop_size,
            self.config.smooth_secs,
        );
        self.record(TraceEntry::finished(
            PipelineStage::Convert,
            "Pitch sequence ready",
            serde_json::json!({
                "frames": smoothed.len(),
                "voiced_frames": smoothed.iter().filter(|&&p| p > 0).count(),
            }),
        ));

        log::info!("Segmenting pitch sequence into notes...");
        self.record(TraceEntry::started(PipelineStage::Segment, "Segmenting notes"));
        let segment_config = SegmentConfig {
            sample_rate: contour.sample_rate,
            hop_size: contour.hop_size,
            min_duration_secs: self.config.min_duration_secs,
            strict_min_duration: self.config.strict_min_duration,
        };
        let notes = segment_notes(&smoothed, &segment_config);
        log::info!("Segmented {} notes", notes.len());
        self.record(TraceEntry::finished(
            PipelineStage::Segment,
            format!("Segmented {} notes", notes.len()),
            serde_json::json!({ "notes": notes.len() }),
        ));

        notes
    }

    /// Run tempo estimation, pitch tracking, and segmentation over a mono buffer
    pub fn transcribe_audio(&self, audio: &MonoAudio) -> Result<Transcription, PipelineError> {
        if audio.samples.is_empty() {
            return Err(AudioError::EmptyAudio.into());
        }

        self.record(TraceEntry::started(PipelineStage::Extract, "Estimating tempo and melody"));

        let TempoEstimate { bpm, confidence } = self.tempo.estimate(&audio.samples, audio.sample_rate);
        log::info!("Estimated bpm: {:.2} (confidence {:.2})", bpm, confidence);

        log::info!("Extracting melody f0...");
        let contour = self.tracker.track(&audio.samples, audio.sample_rate)?;
        log::debug!(
            "Contour: {} frames, {} voiced, hop {}",
            contour.len(),
            contour.voiced_frames(),
            contour.hop_size
        );
        self.record(TraceEntry::finished(
            PipelineStage::Extract,
            "Melody extracted",
            serde_json::json!({
                "bpm": bpm,
                "tempo_confidence": confidence,
                "frames": contour.len(),
                "voiced_frames": contour.voiced_frames(),
            }),
        ));

        let notes = self.notes_from_contour(&contour);

        Ok(Transcription {
            notes,
            sample_rate: audio.sample_rate,
            tempo_bpm: bpm,
        })
    }

    /// Transcribe `input` and write the MIDI file to `output`.
    ///
    /// The MIDI bytes are fully encoded before the destination is touched, so
    /// an analysis failure never leaves a partial file behind.
    pub fn transcribe_file(&self, input: &Path, output: &Path) -> Result<Transcription, PipelineError> {
        log::info!("Loading audio...");
        self.record(TraceEntry::started(PipelineStage::Load, format!("Loading {}", input.display())));
        let audio = audio::load_mono(input, self.config.sample_rate)?;
        self.record(TraceEntry::finished(
            PipelineStage::Load,
            "Audio loaded",
            serde_json::json!({
                "samples": audio.samples.len(),
                "sample_rate": audio.sample_rate,
                "duration_secs": audio.duration_secs(),
            }),
        ));

        let transcription = self.transcribe_audio(&audio)?;

        log::info!("Saving MIDI to disk...");
        self.record(TraceEntry::started(PipelineStage::Save, format!("Writing {}", output.display())));
        let bytes = export::export_midi(&transcription.notes, transcription.tempo_bpm, &self.config.midi)?;
        std::fs::write(output, &bytes).map_err(|source| PipelineError::Write {
            path: output.to_path_buf(),
            source,
        })?;
        log::info!("{}", output.display());
        self.record(TraceEntry::finished(
            PipelineStage::Save,
            "MIDI written",
            serde_json::json!({ "bytes": bytes.len() }),
        ));

        Ok(transcription)
    }

    fn record(&self, entry: TraceEntry) {
        if let Some(ref writer) = self.trace {
            if let Err(e) = writer.write(&entry) {
                log::warn!("Failed to write trace to {}: {}", writer.path().display(), e);
            }
        }
    }
}

/// Write the note list, sample rate and tempo as pretty JSON
pub fn write_notes_json(path: &Path, transcription: &Transcription) -> Result<(), PipelineError> {
    let write_error = |source: std::io::Error| PipelineError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = BufWriter::new(File::create(path).map_err(write_error)?);
    serde_json::to_writer_pretty(&mut writer, transcription).map_err(|e| write_error(e.into()))?;
    writer.flush().map_err(write_error)
}
