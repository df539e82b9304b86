// Pitch smoothing
// Centered median filter that removes short glitches and octave errors

/// Median filter length in frames for a smoothing duration.
///
/// Returns `None` when smoothing is disabled (non-positive or non-finite
/// duration). Even lengths are bumped to the next odd value so the window
/// stays centered on the frame being filtered.
pub fn smoothing_window_frames(smooth_secs: f64, sample_rate: u32, hop_size: usize) -> Option<usize> {
    if !smooth_secs.is_finite() || smooth_secs <= 0.0 || sample_rate == 0 || hop_size == 0 {
        return None;
    }

    let frames = (smooth_secs * sample_rate as f64 / hop_size as f64).round() as usize;
    if frames % 2 == 0 {
        Some(frames + 1)
    } else {
        Some(frames)
    }
}

/// Centered median filter over a pitch sequence.
///
/// Neighbors past either end count as silence (zero padding), so a voiced
/// region touching the sequence boundary is eroded by up to half a window.
/// A window of 1 (or an even window, rounded down to odd) returns the input.
/// Windows wider than `2 * len + 1` behave exactly like `2 * len + 1`: every
/// frame then sees a majority of padding and filters to silence.
pub fn median_filter(pitches: &[u8], window: usize) -> Vec<u8> {
    let window = if window % 2 == 0 { window.saturating_sub(1) } else { window };
    let window = window.min(2 * pitches.len() + 1);
    if window <= 1 || pitches.is_empty() {
        return pitches.to_vec();
    }

    let half = window / 2;
    let mut scratch = Vec::with_capacity(window);

    (0..pitches.len())
        .map(|i| {
            scratch.clear();
            for offset in 0..window {
                let value = (i + offset)
                    .checked_sub(half)
                    .and_then(|idx| pitches.get(idx))
                    .copied()
                    .unwrap_or(0);
                scratch.push(value);
            }
            *scratch.select_nth_unstable(half).1
        })
        .collect()
}

/// Smooth a pitch sequence with a median filter spanning `smooth_secs`.
///
/// Output length always equals input length; a disabled smoother returns an
/// element-wise copy.
pub fn smooth_pitches(pitches: &[u8], sample_rate: u32, hop_size: usize, smooth_secs: f64) -> Vec<u8> {
    match smoothing_window_frames(smooth_secs, sample_rate, hop_size) {
        Some(window) => {
            log::debug!("Median filtering {} frames with window {}", pitches.len(), window);
            median_filter(pitches, window)
        }
        None => pitches.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_smoothing_is_identity() {
        let pitches = vec![60, 0, 72, 72, 61, 0, 0, 59];
        assert_eq!(smooth_pitches(&pitches, 44100, 128, 0.0), pitches);
        assert_eq!(smooth_pitches(&pitches, 44100, 128, -0.5), pitches);
    }

    #[test]
    fn test_window_is_always_odd() {
        // 0.25 s at 44100/128 = 86.13 frames -> 86 -> 87
        assert_eq!(smoothing_window_frames(0.25, 44100, 128), Some(87));
        // exactly 4 frames -> 5
        assert_eq!(smoothing_window_frames(4.0 * 128.0 / 44100.0, 44100, 128), Some(5));
        // exactly 3 frames stays 3
        assert_eq!(smoothing_window_frames(3.0 * 128.0 / 44100.0, 44100, 128), Some(3));
        assert_eq!(smoothing_window_frames(0.0, 44100, 128), None);
    }

    #[test]
    fn test_tiny_duration_yields_unit_window() {
        // rounds to 0 frames, normalized to 1: no-op filter
        assert_eq!(smoothing_window_frames(1e-6, 44100, 128), Some(1));
        let pitches = vec![60, 61, 62];
        assert_eq!(smooth_pitches(&pitches, 44100, 128, 1e-6), pitches);
    }

    #[test]
    fn test_median_removes_single_frame_spike() {
        let pitches = vec![60, 60, 60, 72, 60, 60, 60];
        let filtered = median_filter(&pitches, 3);
        assert_eq!(filtered, vec![60, 60, 60, 60, 60, 60, 60]);
    }

    #[test]
    fn test_median_fills_single_frame_dropout() {
        let pitches = vec![64, 64, 0, 64, 64];
        assert_eq!(median_filter(&pitches, 3), vec![64, 64, 64, 64, 64]);
    }

    #[test]
    fn test_median_zero_pads_edges() {
        let pitches = vec![60, 60, 60, 60, 60];
        // Window 5: first frame sees [0, 0, 60, 60, 60] -> 60, still a majority
        assert_eq!(median_filter(&pitches, 5), pitches);
        // A run shorter than half the window is swallowed by the padding
        assert_eq!(median_filter(&[60, 60, 60], 7), vec![0, 0, 0]);
        assert_eq!(median_filter(&[60, 60, 60, 60], 7), vec![60, 60, 60, 60]);
    }

    #[test]
    fn test_huge_window_is_bounded_by_input() {
        // 1e9 s of smoothing asks for ~3.4e11 frames
        assert_eq!(smooth_pitches(&[60; 10], 44100, 128, 1e9), vec![0; 10]);
        assert_eq!(median_filter(&[60, 61, 62], usize::MAX), vec![0, 0, 0]);
        assert_eq!(median_filter(&[64; 5], 11), median_filter(&[64; 5], 1_000_001));
    }

    #[test]
    fn test_length_preserved() {
        let pitches: Vec<u8> = (0..200).map(|i| (i % 7) as u8 + 60).collect();
        assert_eq!(median_filter(&pitches, 87).len(), 200);
        assert_eq!(smooth_pitches(&pitches, 44100, 128, 0.25).len(), 200);
    }

    #[test]
    fn test_empty_input() {
        assert!(smooth_pitches(&[], 44100, 128, 0.25).is_empty());
    }
}
