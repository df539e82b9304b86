// Compressed and container audio decoding
// MP3, OGG/Vorbis, FLAC, AAC/ALAC in MP4 and friends through symphonia

use std::io::{Cursor, ErrorKind};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::ingest::{AudioError, DecodedAudio};

/// Decode the first audio track of an in-memory media file.
///
/// `extension` is only a hint for the format probe; the stream contents
/// decide. Corrupt packets are skipped with a warning.
pub fn decode_container(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, AudioError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    if sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate(sample_rate));
    }
    let mut channels = track.codec_params.channels.map_or(1, |c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::Codec(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(AudioError::Codec(e.to_string())),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count() as u16;
        let needed = decoded.capacity() * spec.channels.count();
        if buffer.as_ref().map_or(true, |b| b.capacity() < needed) {
            buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(ref mut buf) = buffer {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
        bits_per_sample: 32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ingest::decode_wav;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn stereo_wav() -> Vec<u8> {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..2000i32 {
                writer.write_sample(((i * 37) % 20000 - 10000) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_matches_hound_on_pcm() {
        let bytes = stereo_wav();
        let reference = decode_wav(&bytes).unwrap();
        let decoded = decode_container(bytes, Some("wav")).unwrap();

        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.frames(), reference.frames());
        for (a, b) in decoded.samples.iter().zip(&reference.samples) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let result = decode_container(b"plain text, no audio stream here".to_vec(), Some("mp3"));
        assert!(matches!(result, Err(AudioError::UnsupportedFormat(_))));
    }
}
