use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Loading stage that ran past its share of the load budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Encoder,
    Adapter,
    Processor,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Encoder => "encoder",
            Self::Adapter => "adapter",
            Self::Processor => "processor",
        })
    }
}

/// Errors raised while loading or running the emotion model.
#[derive(Debug, Clone, Error)]
pub enum SerError {
    #[error("Failed to load emotion model from {path}: {message}")]
    Load { path: PathBuf, message: String },
    #[error("Emotion model load exceeded its budget during the {phase} phase")]
    LoadTimeout { phase: LoadPhase },
    #[error("Unable to read audio {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Emotion inference failed: {0}")]
    Inference(String),
    #[error("Emotion detection exceeded its budget after {phase}")]
    Timeout { phase: &'static str },
}
