// Pipeline execution and monitoring module
// Orchestrates the full audio-to-MIDI transcription pipeline

pub mod config;
pub mod trace;
pub mod transcribe;

pub use config::TranscribeConfig;
pub use trace::{read_trace_file, PipelineStage, TraceEntry, TraceError, TraceWriter};
pub use transcribe::{write_notes_json, PipelineError, Transcriber, Transcription};
