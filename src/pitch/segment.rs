// Note segmentation
// Collapses runs of identical pitch into timed note events

use serde::{Deserialize, Serialize};

use super::convert::SILENCE;

/// A transcribed note: onset and duration in seconds, MIDI pitch 1..=127
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub onset_secs: f64,
    pub duration_secs: f64,
    pub pitch: u8,
}

impl Note {
    pub fn end_secs(&self) -> f64 {
        self.onset_secs + self.duration_secs
    }
}

/// Timing and filtering parameters for segmentation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentConfig {
    /// Audio sample rate the frames were computed at
    pub sample_rate: u32,

    /// Samples between consecutive frames
    pub hop_size: usize,

    /// Voiced runs shorter than this are dropped
    pub min_duration_secs: f64,

    /// Apply `min_duration_secs` to the final run as well.
    /// Off by default: the trailing run is always kept.
    pub strict_min_duration: bool,
}

impl SegmentConfig {
    fn frames_to_secs(&self, frames: usize) -> f64 {
        (frames * self.hop_size) as f64 / self.sample_rate as f64
    }
}

/// A maximal run of frames sharing one pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PitchRun {
    pitch: u8,
    start_frame: usize,
    length: usize,
}

impl PitchRun {
    fn is_voiced(&self) -> bool {
        self.pitch != SILENCE && self.length > 0
    }

    fn to_note(self, config: &SegmentConfig) -> Note {
        Note {
            onset_secs: config.frames_to_secs(self.start_frame),
            duration_secs: config.frames_to_secs(self.length),
            pitch: self.pitch,
        }
    }
}

/// Scanner state between frames
#[derive(Debug, Clone, Copy, Default)]
struct RunState {
    previous_pitch: u8,
    run_start_frame: usize,
    run_length: usize,
}

impl RunState {
    /// Feed frame `frame` with pitch `pitch`. Returns the next state and,
    /// when the pitch changed, the run that just ended.
    fn step(self, frame: usize, pitch: u8) -> (RunState, Option<PitchRun>) {
        if pitch == self.previous_pitch {
            let extended = RunState {
                run_length: self.run_length + 1,
                ..self
            };
            return (extended, None);
        }

        let next = RunState {
            previous_pitch: pitch,
            run_start_frame: frame,
            run_length: 1,
        };
        (next, Some(self.current_run()))
    }

    fn current_run(&self) -> PitchRun {
        PitchRun {
            pitch: self.previous_pitch,
            start_frame: self.run_start_frame,
            length: self.run_length,
        }
    }
}

/// Segment a (smoothed) pitch sequence into notes.
///
/// Single forward pass. Silence runs never produce notes. A voiced run that
/// ends because the pitch changed is kept only if it lasts at least
/// `min_duration_secs`; the run still open when the sequence ends is kept
/// regardless unless `strict_min_duration` is set.
///
/// Notes come out in onset order and never overlap: each one ends at or
/// before the next one's onset.
pub fn segment_notes(pitches: &[u8], config: &SegmentConfig) -> Vec<Note> {
    if config.sample_rate == 0 || config.hop_size == 0 {
        return Vec::new();
    }

    let long_enough = |note: &Note| note.duration_secs >= config.min_duration_secs;

    let (last, mut notes) = pitches.iter().enumerate().fold(
        (RunState::default(), Vec::new()),
        |(state, mut notes), (frame, &pitch)| {
            let (next, closed) = state.step(frame, pitch);
            if let Some(run) = closed.filter(PitchRun::is_voiced) {
                let note = run.to_note(config);
                if long_enough(&note) {
                    notes.push(note);
                } else {
                    log::trace!("Dropping {:.4}s note at pitch {}", note.duration_secs, note.pitch);
                }
            }
            (next, notes)
        },
    );

    let trailing = last.current_run();
    if trailing.is_voiced() {
        let note = trailing.to_note(config);
        if !config.strict_min_duration || long_enough(&note) {
            notes.push(note);
        }
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: u32 = 44100;
    const HOP: usize = 128;

    fn config(min_duration_secs: f64) -> SegmentConfig {
        SegmentConfig {
            sample_rate: FS,
            hop_size: HOP,
            min_duration_secs,
            strict_min_duration: false,
        }
    }

    fn secs(frames: f64) -> f64 {
        frames * HOP as f64 / FS as f64
    }

    #[test]
    fn test_two_notes_separated_by_silence() {
        let pitches = [60, 60, 60, 0, 0, 62, 62, 62, 62];
        let notes = segment_notes(&pitches, &config(0.0));

        assert_eq!(
            notes,
            vec![
                Note { onset_secs: 0.0, duration_secs: secs(3.0), pitch: 60 },
                Note { onset_secs: secs(5.0), duration_secs: secs(4.0), pitch: 62 },
            ]
        );
    }

    #[test]
    fn test_min_duration_drops_short_note() {
        let pitches = [60, 60, 60, 0, 0, 62, 62, 62, 62];
        let notes = segment_notes(&pitches, &config(secs(3.5)));

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 62);
        assert_eq!(notes[0].onset_secs, secs(5.0));
    }

    #[test]
    fn test_all_silence_yields_no_notes() {
        let pitches = vec![0u8; 100];
        assert!(segment_notes(&pitches, &config(0.0)).is_empty());
        assert!(segment_notes(&[], &config(0.0)).is_empty());
    }

    #[test]
    fn test_final_run_bypasses_min_duration() {
        let pitches = [60, 60, 60, 60, 60, 67];
        let notes = segment_notes(&pitches, &config(secs(2.0)));

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].pitch, 67);
        assert_eq!(notes[1].duration_secs, secs(1.0));
    }

    #[test]
    fn test_strict_mode_filters_final_run() {
        let pitches = [60, 60, 60, 60, 60, 67];
        let strict = SegmentConfig {
            strict_min_duration: true,
            ..config(secs(2.0))
        };
        let notes = segment_notes(&pitches, &strict);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
    }

    #[test]
    fn test_adjacent_pitches_are_contiguous() {
        let pitches = [60, 60, 61, 61, 61, 59];
        let notes = segment_notes(&pitches, &config(0.0));

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].end_secs(), notes[1].onset_secs);
        assert_eq!(notes[1].end_secs(), notes[2].onset_secs);
    }

    #[test]
    fn test_jitter_each_frame_filtered_independently() {
        let pitches = [60, 61, 60, 61, 60, 61, 0];
        let notes = segment_notes(&pitches, &config(secs(1.5)));
        assert!(notes.is_empty());

        let notes = segment_notes(&pitches, &config(0.0));
        assert_eq!(notes.len(), 6);
        assert!(notes.iter().all(|n| n.duration_secs == secs(1.0)));
    }

    #[test]
    fn test_leading_voiced_frame_starts_at_zero() {
        let notes = segment_notes(&[72], &config(0.0));
        assert_eq!(notes, vec![Note { onset_secs: 0.0, duration_secs: secs(1.0), pitch: 72 }]);
    }

    #[test]
    fn test_properties_on_mixed_sequence() {
        let pitches: Vec<u8> = (0..500)
            .map(|i| match (i / 7) % 5 {
                0 => 0,
                1 => 60,
                2 => 64,
                3 => 64,
                _ => 67,
            })
            .collect();
        let min = secs(10.0);
        let notes = segment_notes(&pitches, &config(min));

        assert!(notes.iter().all(|n| n.pitch != 0));
        for pair in notes.windows(2) {
            assert!(pair[0].end_secs() <= pair[1].onset_secs + 1e-12);
        }
        for (i, note) in notes.iter().enumerate() {
            if i + 1 < notes.len() {
                assert!(note.duration_secs >= min);
            }
        }
    }
}
