use std::path::PathBuf;

use thiserror::Error;

use crate::voice::VoiceError;

/// Failures of a whole synthesis request.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Synthesis is switched off in the configuration.
    #[error("Text-to-speech is disabled")]
    Disabled,
    /// Nothing to say after normalization.
    #[error("No text to synthesize")]
    EmptyText,
    /// The speech model could not be prepared.
    #[error("Speech model unavailable: {0}")]
    Model(String),
    /// Every chunk failed to generate.
    #[error("No audio produced for {chunks} chunk(s)")]
    NoAudio { chunks: usize },
    /// The speaker embedding could not be obtained.
    #[error(transparent)]
    Voice(#[from] VoiceError),
    /// The output directory could not be created.
    #[error("Unable to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The audio file could not be written.
    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },
}
