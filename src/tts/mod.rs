//! Chunked text-to-speech: the speech model seam, chunk assembly, post-processing
//! and output housekeeping.

mod assemble;
mod cleanup;
mod error;
mod model;
mod synthesizer;

pub use assemble::Assembly;
pub use cleanup::{DEFAULT_MAX_AUDIO_AGE, cleanup_old_audio, fallback_html};
pub use error::SynthesisError;
pub use model::{CommandSpeechModel, DEFAULT_MAX_INPUT_TOKENS, SpeechModel};
pub use synthesizer::{RenderedSpeech, SpeechSynthesizer, SynthesisReport};
