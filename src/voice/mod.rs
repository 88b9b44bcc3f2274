//! Reference-voice handling: preprocessing, speaker encoders, extraction and the
//! two-tier embedding cache.

mod cache;
mod encoder;
mod error;
mod extract;
mod preprocess;
mod resolve;
mod signature;
mod vector;

pub use cache::{EmbeddingCache, EmbeddingOutcome, EmbeddingSource, FallbackPolicy};
pub use encoder::{
    EMBEDDING_DIM, ENCODER_SAMPLE_RATE, LogMelStatsEncoder, ProjectionEncoder, ProjectionWeights,
    RandomEncoder, SpeakerEncoder, seeded_gaussian, select_encoder,
};
pub use error::VoiceError;
pub use extract::{SegmentPlan, SpeakerEmbeddingExtractor, segment_for_embedding};
pub use preprocess::{
    AudioPreprocessor, DurationWindow, PreprocessParams, energy_gate, fit_duration, trim_silence,
};
pub use resolve::{ReferenceResolver, VoiceSelection};
pub use signature::{ReferenceAudioSet, cache_key};
pub use vector::{EmbeddingStats, l2_norm, l2_normalize};
