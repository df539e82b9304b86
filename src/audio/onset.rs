// Onset detection
// Spectral flux novelty curve with adaptive peak picking, feeds the tempo estimator

use realfft::RealFftPlanner;

/// A detected note attack
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Onset {
    /// Seconds from the start of the buffer
    pub time_secs: f64,

    /// Peak height above the adaptive threshold, in standard deviations, capped at 1
    pub strength: f32,
}

#[derive(Debug, Clone)]
pub struct OnsetConfig {
    /// Analysis frame length in samples
    pub frame_size: usize,

    /// Samples between novelty frames
    pub hop_size: usize,

    /// Peaks must exceed mean + sensitivity * std of the novelty curve
    pub sensitivity: f32,

    /// Onsets closer than this to the previous one are ignored
    pub refractory_secs: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            frame_size: 2048,
            hop_size: 512,
            sensitivity: 1.5,
            refractory_secs: 0.03,
        }
    }
}

/// Detect onsets in a mono buffer. Returns them in time order.
pub fn detect_onsets(samples: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<Onset> {
    if sample_rate == 0 || config.hop_size == 0 || config.frame_size == 0 {
        return Vec::new();
    }

    let novelty = spectral_flux(samples, config.frame_size, config.hop_size);
    let frame_secs = config.hop_size as f64 / sample_rate as f64;
    pick_peaks(&novelty, frame_secs, config)
}

fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (std::f32::consts::TAU * i as f32 / len as f32).cos())
        .collect()
}

/// Half-wave rectified frame-to-frame increase in magnitude spectrum.
/// The first frame has no predecessor and scores zero.
fn spectral_flux(samples: &[f32], frame_size: usize, hop_size: usize) -> Vec<f32> {
    if samples.len() < frame_size {
        return Vec::new();
    }
    let frames = (samples.len() - frame_size) / hop_size + 1;

    let fft = RealFftPlanner::<f32>::new().plan_fft_forward(frame_size);
    let window = hann(frame_size);
    let mut buffer = fft.make_input_vec();
    let mut bins = fft.make_output_vec();
    let mut previous = vec![0.0f32; bins.len()];
    let mut novelty = Vec::with_capacity(frames);

    for frame in 0..frames {
        let offset = frame * hop_size;
        for ((dst, &src), &w) in buffer
            .iter_mut()
            .zip(&samples[offset..offset + frame_size])
            .zip(&window)
        {
            *dst = src * w;
        }

        if let Err(e) = fft.process(&mut buffer, &mut bins) {
            log::warn!("Onset FFT failed at frame {}: {}", frame, e);
            return Vec::new();
        }

        let mut rise = 0.0f32;
        for (bin, prev) in bins.iter().zip(previous.iter_mut()) {
            let magnitude = bin.norm();
            if frame > 0 {
                rise += (magnitude - *prev).max(0.0);
            }
            *prev = magnitude;
        }
        novelty.push(rise);
    }

    novelty
}

/// Local maxima of the novelty curve above mean + k * std, with a refractory gap
fn pick_peaks(novelty: &[f32], frame_secs: f64, config: &OnsetConfig) -> Vec<Onset> {
    if novelty.len() < 3 {
        return Vec::new();
    }

    let count = novelty.len() as f32;
    let mean = novelty.iter().sum::<f32>() / count;
    let std_dev = (novelty.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / count).sqrt();
    let threshold = mean + config.sensitivity * std_dev;

    let mut onsets: Vec<Onset> = Vec::new();
    for (i, triple) in novelty.windows(3).enumerate() {
        let (before, value, after) = (triple[0], triple[1], triple[2]);
        if value <= before || value <= after || value <= threshold {
            continue;
        }

        let time_secs = (i + 1) as f64 * frame_secs;
        let too_close = onsets
            .last()
            .is_some_and(|last| time_secs - last.time_secs < config.refractory_secs);
        if too_close {
            continue;
        }

        onsets.push(Onset {
            time_secs,
            strength: ((value - threshold) / std_dev.max(f32::EPSILON)).min(1.0),
        });
    }

    onsets
}
