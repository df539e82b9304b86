// Export module
// Serializes transcribed notes as Standard MIDI Files

pub mod midi;

pub use midi::{export_midi, seconds_to_beats, MidiError, MidiExportOptions};
