// Groove Engine - Tempo
// Global BPM estimation used to place notes on the MIDI beat axis

pub mod tempo;

pub use tempo::{
    estimate_tempo, estimate_tempo_with_config, FixedTempo, OnsetTempoEstimator, TempoConfig,
    TempoEstimate, TempoEstimator, FALLBACK_BPM,
};
