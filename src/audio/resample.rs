// Sample rate conversion
// Linear interpolation resampler used to bring decoded audio to the analysis rate

/// Resample `samples` from `from_rate` to `to_rate` by linear interpolation.
///
/// Output length is `round(len * to_rate / from_rate)`. Equal rates return a copy.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if samples.is_empty() || from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = (samples.len() as f64 * ratio).round() as usize;
    let last = samples.len() - 1;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let s0 = samples[idx.min(last)];
        let s1 = samples[(idx + 1).min(last)];
        output.push(s0 + frac * (s1 - s0));
    }

    output
}
