use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning reference audio into a speaker embedding.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// No reference files were supplied and random fallback is not permitted.
    #[error("No reference audio available and random fallback is disabled")]
    NoReferenceAudio,
    /// No configured speaker encoder could be constructed.
    #[error("No speaker encoder available: {reason}")]
    NoEncoder { reason: String },
    /// Every reference file was skipped.
    #[error("No valid embeddings from {files} reference file(s)")]
    NoValidEmbeddings { files: usize },
    /// A speaker encoder rejected its input or weights.
    #[error("Speaker encoder {encoder} failed: {message}")]
    Encoder { encoder: String, message: String },
    /// Reference audio could not be decoded.
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    /// The embedding cache could not read or write a file.
    #[error("Embedding cache I/O at {path}: {source}")]
    CacheIo {
        path: PathBuf,
        source: std::io::Error,
    },
}
