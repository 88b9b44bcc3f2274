//! Speech emotion recognition: a log-mel frame encoder with an optional low-rank
//! adapter and an 8-way classification head.

mod adapter;
mod engine;
mod error;
mod features;
mod labels;
mod model;

pub use adapter::{ADAPTER_CONFIG_FILE, ADAPTER_WEIGHTS_FILE, Adapter, AdapterConfig, AdapterWeights};
pub use engine::{EmotionClassifier, EmotionOutcome, SerInferenceEngine, classify};
pub use error::{LoadPhase, SerError};
pub use features::{FeatureExtractorConfig, LogMelFeatures, PREPROCESSOR_CONFIG_FILE};
pub use labels::{EmotionDistribution, EmotionLabel, LABEL_COUNT};
pub use model::{
    ClassificationHead, ENCODER_FILE, EmotionModel, EncoderWeights, FrameEncoder, softmax,
};
