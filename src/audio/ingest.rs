// Audio loading
// WAV through hound, other containers through symphonia, then mono downmix and resampling

use hound::{SampleFormat, WavReader};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::container::decode_container;
use super::resample::resample_linear;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a readable WAV stream: {0}")]
    Decode(#[from] hound::Error),

    #[error("Failed to decode audio stream: {0}")]
    Codec(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),
}

/// Decoded audio, interleaved and normalized to [-1.0, 1.0]
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl DecodedAudio {
    /// Sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average all channels of each frame
    pub fn downmix(&self) -> Vec<f32> {
        match self.channels {
            0 | 1 => self.samples.clone(),
            n => {
                let n = n as usize;
                self.samples
                    .chunks_exact(n)
                    .map(|frame| frame.iter().sum::<f32>() / n as f32)
                    .collect()
            }
        }
    }
}

/// Mono analysis buffer at the pipeline sample rate
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Read integer samples and scale them by `full_scale`
fn read_int<R: Read, T>(reader: &mut WavReader<R>, full_scale: f32) -> Result<Vec<f32>, hound::Error>
where
    T: hound::Sample + Into<f32>,
{
    reader
        .samples::<T>()
        .map(|s| s.map(|v| v.into() / full_scale))
        .collect()
}

/// Decode an in-memory WAV file
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, AudioError> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    if spec.sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate(spec.sample_rate));
    }
    if spec.channels == 0 {
        return Err(AudioError::UnsupportedFormat("zero channels".to_string()));
    }

    // 24- and 32-bit PCM both come back as i32
    let samples = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => read_int::<_, i8>(&mut reader, 128.0)?,
        (SampleFormat::Int, 16) => read_int::<_, i16>(&mut reader, 32768.0)?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v as f64 / 2_147_483_648.0) as f32))
            .collect::<Result<Vec<_>, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!("{:?} {}-bit audio", format, bits)));
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
    })
}

fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Load an audio file from disk, downmix to mono and resample to `target_rate`.
///
/// Fails with [`AudioError::EmptyAudio`] when the file holds no sample frames,
/// so callers never run pitch analysis on an empty buffer.
pub fn load_mono(path: &Path, target_rate: u32) -> Result<MonoAudio, AudioError> {
    if target_rate == 0 {
        return Err(AudioError::InvalidSampleRate(target_rate));
    }

    let bytes = std::fs::read(path).map_err(|source| AudioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = if is_riff_wave(&bytes) {
        decode_wav(&bytes)?
    } else {
        let extension = path.extension().and_then(|ext| ext.to_str());
        decode_container(bytes, extension)?
    };

    log::debug!(
        "Decoded {}: {} Hz, {} ch, {} bit, {:.2}s",
        path.display(),
        decoded.sample_rate,
        decoded.channels,
        decoded.bits_per_sample,
        decoded.duration_secs()
    );

    if decoded.frames() == 0 {
        return Err(AudioError::EmptyAudio);
    }

    Ok(MonoAudio {
        samples: resample_linear(&decoded.downmix(), decoded.sample_rate, target_rate),
        sample_rate: target_rate,
    })
}
