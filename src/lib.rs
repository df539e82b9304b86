// Melomidi - Monophonic audio to MIDI melody transcriber
// Module declarations

pub mod audio;
pub mod export;
pub mod groove;
pub mod pipeline;
pub mod pitch;

pub use export::{export_midi, MidiExportOptions};
pub use pipeline::{PipelineError, Transcriber, TranscribeConfig, Transcription};
pub use pitch::{frequencies_to_pitches, segment_notes, smooth_pitches, Note, SegmentConfig};
