// MIDI Export - Convert transcribed notes to a single-track MIDI file using midly
// Note timing is rescaled from seconds to beats at the estimated tempo

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pitch::{Note, MAX_MIDI_PITCH};

/// Largest value representable as a 24-bit tempo (microseconds per quarter)
const MAX_TEMPO_US: u32 = 0x00FF_FFFF;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("Tempo must be a positive number of BPM, got {0}")]
    InvalidTempo(f64),

    #[error("Note {index} has pitch {pitch}, expected 1..=127")]
    InvalidPitch { index: usize, pitch: u8 },

    #[error("Note {index} has invalid timing (onset {onset_secs}s, duration {duration_secs}s)")]
    InvalidTiming {
        index: usize,
        onset_secs: f64,
        duration_secs: f64,
    },

    #[error("Invalid export options: {0}")]
    InvalidOptions(String),

    #[error("Failed to encode MIDI: {0}")]
    Encode(#[from] std::io::Error),
}

/// MIDI export options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ), at most 32767
    pub ppq: u16,

    /// Name written as the track's first meta event
    pub track_name: String,

    /// MIDI channel (0-15) for every note
    pub channel: u8,

    /// Note-on velocity (1-127) for every note
    pub velocity: u8,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 960,
            track_name: "MIDI TRACK".to_string(),
            channel: 0,
            velocity: 100,
        }
    }
}

impl MidiExportOptions {
    pub fn validate(&self) -> Result<(), MidiError> {
        if self.ppq == 0 || self.ppq > 0x7FFF {
            return Err(MidiError::InvalidOptions(format!("ppq must be 1..=32767, got {}", self.ppq)));
        }
        if self.channel > 15 {
            return Err(MidiError::InvalidOptions(format!(
                "channel must be 0..=15, got {}",
                self.channel
            )));
        }
        if self.velocity == 0 || self.velocity > 127 {
            return Err(MidiError::InvalidOptions(format!(
                "velocity must be 1..=127, got {}",
                self.velocity
            )));
        }
        Ok(())
    }
}

/// Convert a time in seconds to beats at `bpm`
pub fn seconds_to_beats(seconds: f64, bpm: f64) -> f64 {
    seconds * (bpm / 60.0)
}

/// Export notes to Format 0 MIDI file bytes
///
/// The single track holds the track name and tempo at tick 0, then one
/// note-on/note-off pair per note on a fixed channel and velocity. Notes are
/// written as given; overlapping input is not merged or trimmed.
pub fn export_midi(notes: &[Note], bpm: f64, options: &MidiExportOptions) -> Result<Vec<u8>, MidiError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(MidiError::InvalidTempo(bpm));
    }
    options.validate()?;

    let header = Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(options.ppq.into()),
    };

    let mut track = Track::new();
    add_track_name(&mut track, &options.track_name);
    add_tempo(&mut track, bpm);

    let note_events = note_events(notes, bpm, options)?;
    let mut last_tick = 0;
    for (tick, kind) in note_events {
        track.push(TrackEvent {
            delta: tick.saturating_sub(last_tick).into(),
            kind,
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header,
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write_std(&mut bytes)?;

    log::debug!("Encoded {} notes into {} MIDI bytes", notes.len(), bytes.len());
    Ok(bytes)
}

/// Absolute-tick note events, sorted with note-offs ahead of note-ons on
/// the same tick
fn note_events<'a>(
    notes: &[Note],
    bpm: f64,
    options: &MidiExportOptions,
) -> Result<Vec<(u32, TrackEventKind<'a>)>, MidiError> {
    let channel = options.channel;
    let mut events: Vec<(u32, bool, TrackEventKind<'a>)> = Vec::with_capacity(notes.len() * 2);

    for (index, note) in notes.iter().enumerate() {
        if note.pitch == 0 || note.pitch > MAX_MIDI_PITCH {
            return Err(MidiError::InvalidPitch {
                index,
                pitch: note.pitch,
            });
        }
        if !(note.onset_secs >= 0.0 && note.duration_secs > 0.0 && note.end_secs().is_finite()) {
            return Err(MidiError::InvalidTiming {
                index,
                onset_secs: note.onset_secs,
                duration_secs: note.duration_secs,
            });
        }

        let tick_on = beats_to_ticks(seconds_to_beats(note.onset_secs, bpm), options.ppq);
        // A note shorter than half a tick still lasts one tick
        let tick_off = beats_to_ticks(seconds_to_beats(note.end_secs(), bpm), options.ppq)
            .max(tick_on.saturating_add(1));

        events.push((
            tick_on,
            true,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOn {
                    key: note.pitch.into(),
                    vel: options.velocity.into(),
                },
            },
        ));
        events.push((
            tick_off,
            false,
            TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::NoteOff {
                    key: note.pitch.into(),
                    vel: 0u8.into(),
                },
            },
        ));
    }

    events.sort_by_key(|(tick, is_on, _)| (*tick, *is_on));
    Ok(events.into_iter().map(|(tick, _, kind)| (tick, kind)).collect())
}

fn beats_to_ticks(beats: f64, ppq: u16) -> u32 {
    (beats * ppq as f64).round().clamp(0.0, u32::MAX as f64) as u32
}

/// Add track name to track
fn add_track_name<'a>(track: &mut Track<'a>, name: &'a str) {
    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    });
}

/// Add tempo meta message (microseconds per quarter note)
fn add_tempo(track: &mut Track<'_>, bpm: f64) {
    let us_per_quarter = (60_000_000.0 / bpm).round().clamp(1.0, MAX_TEMPO_US as f64) as u32;

    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.into())),
    });
}
