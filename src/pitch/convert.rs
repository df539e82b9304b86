// Frequency to MIDI pitch conversion
// Quantizes f0 estimates to semitones, unvoiced frames map to silence

/// Pitch value used for unvoiced frames
pub const SILENCE: u8 = 0;

/// Highest MIDI key number
pub const MAX_MIDI_PITCH: u8 = 127;

/// Reference tuning: A4 = 440 Hz = MIDI 69
const A4_HZ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;

/// Keeps log2 away from zero and biases near-zero ratios below pitch 0
const LOG_EPSILON: f64 = 1e-5;

/// Convert a single frequency estimate to a quantized MIDI pitch.
///
/// Non-positive and non-finite frequencies never reach the logarithm and map to
/// [`SILENCE`]. Results at or below zero also become silence, which means very
/// low but voiced estimates (below ~8.2 Hz) are indistinguishable from
/// unvoiced frames. Results above 127 saturate at [`MAX_MIDI_PITCH`].
pub fn hz_to_midi(hz: f32) -> u8 {
    if !hz.is_finite() || hz <= 0.0 {
        return SILENCE;
    }

    let midi = A4_MIDI + 12.0 * (hz as f64 / A4_HZ + LOG_EPSILON).log2();
    let rounded = midi.round();

    if rounded <= 0.0 {
        SILENCE
    } else {
        rounded.min(MAX_MIDI_PITCH as f64) as u8
    }
}

/// Convert a frequency sequence into a pitch sequence of equal length
pub fn frequencies_to_pitches(frequencies: &[f32]) -> Vec<u8> {
    frequencies.iter().map(|&hz| hz_to_midi(hz)).collect()
}
