// Pitch analysis module
// f0 tracking, Hz-to-MIDI quantization, median smoothing, and note segmentation

pub mod convert;
pub mod segment;
pub mod smooth;
pub mod tracker;
pub mod yin;

pub use convert::{frequencies_to_pitches, hz_to_midi, MAX_MIDI_PITCH, SILENCE};
pub use segment::{segment_notes, Note, SegmentConfig};
pub use smooth::{median_filter, smooth_pitches, smoothing_window_frames};
pub use tracker::{FrequencyContour, PitchTracker, TrackerError};
pub use yin::{YinConfig, YinTracker};
