//! Voice core of the therapy assistant: reference-voice embeddings, chunked
//! speech synthesis and speech emotion recognition.
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::error;

/// Application directory helpers.
pub mod app_dirs;
/// TOML configuration and environment overrides.
pub mod config;
/// Filters, pitch shifting and spectral front ends.
pub mod dsp;
/// Logging setup.
pub mod logging;
/// Speech emotion recognition.
pub mod ser;
/// Shared service object behind the entry points.
pub mod service;
/// Audio decoding, resampling and level helpers.
pub mod signal;
/// Text normalization, tokenization and chunking.
pub mod text;
/// Chunked text-to-speech.
pub mod tts;
/// Reference voices and speaker embeddings.
pub mod voice;

pub use ser::{EmotionDistribution, EmotionLabel, EmotionOutcome};
pub use service::{ServicePaths, VoiceService};
pub use voice::VoiceSelection;

/// Speak `text` into a new WAV file under `output_dir` with the shared service.
///
/// `voice` is a voice name or comma-separated WAV paths. Returns `None` for
/// blank text, when synthesis is disabled, or on any failure (logged).
pub fn synthesize(text: &str, output_dir: &Path, voice: Option<&str>) -> Option<PathBuf> {
    let voice = voice.map(VoiceSelection::parse).unwrap_or_default();
    panic::catch_unwind(AssertUnwindSafe(|| {
        VoiceService::global().synthesize(text, output_dir, &voice)
    }))
    .unwrap_or_else(|_| {
        error!("Speech synthesis panicked");
        None
    })
}

/// Emotion distribution over all eight labels for the audio at `audio_path`.
///
/// Any failure, a zero or negative timeout included, yields the uniform distribution.
pub fn detect_emotion(audio_path: &Path, timeout_seconds: f64) -> EmotionDistribution {
    let timeout = Duration::try_from_secs_f64(timeout_seconds).unwrap_or(Duration::ZERO);
    panic::catch_unwind(AssertUnwindSafe(|| {
        VoiceService::global()
            .detect_emotion(audio_path, Some(timeout))
            .into_distribution()
    }))
    .unwrap_or_else(|_| {
        error!("Emotion detection panicked");
        EmotionDistribution::uniform()
    })
}
