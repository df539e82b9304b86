// Audio processing module
// Handles decoding (WAV and compressed containers), mono downmix/resampling, and onset detection

pub mod container;
pub mod ingest;
pub mod onset;
pub mod resample;

pub use container::decode_container;
pub use ingest::{decode_wav, load_mono, AudioError, DecodedAudio, MonoAudio};
pub use onset::{detect_onsets, Onset, OnsetConfig};
pub use resample::resample_linear;
