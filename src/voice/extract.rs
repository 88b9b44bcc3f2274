use std::path::Path;

use tracing::{debug, warn};

use super::encoder::SpeakerEncoder;
use super::error::VoiceError;
use super::preprocess::{AudioPreprocessor, DurationWindow, PreprocessParams};
use super::signature::ReferenceAudioSet;
use crate::config::ReferenceVoiceSettings;
use crate::signal::{decode_mono, seconds_to_samples};

/// How a cleaned reference signal is cut into encoder-sized segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPlan {
    pub segment_seconds: f32,
    pub hop_seconds: f32,
    pub max_segments: usize,
    /// Segments whose mean absolute amplitude is below this are skipped.
    pub energy_floor: f32,
}

impl SegmentPlan {
    pub fn from_settings(settings: &ReferenceVoiceSettings) -> Self {
        Self {
            segment_seconds: settings.segment_seconds,
            hop_seconds: settings.segment_hop_seconds,
            max_segments: settings.max_segments.max(1),
            energy_floor: settings.segment_energy_floor,
        }
    }
}

impl Default for SegmentPlan {
    fn default() -> Self {
        Self::from_settings(&ReferenceVoiceSettings::default())
    }
}

/// Cut `samples` into at most `plan.max_segments` full-length, non-silent windows.
///
/// Starts advance by the hop while below `max(len - window, 1)`; only the first
/// `3 * max_segments` starts are examined. Falls back to the first
/// `min(window, len)` samples when nothing qualifies.
pub fn segment_for_embedding<'a>(
    samples: &'a [f32],
    sample_rate: u32,
    plan: &SegmentPlan,
) -> Vec<&'a [f32]> {
    let window = seconds_to_samples(plan.segment_seconds, sample_rate).max(1);
    let hop = seconds_to_samples(plan.hop_seconds, sample_rate).max(1);
    let len = samples.len();
    let limit = len.saturating_sub(window).max(1);

    let mut segments = Vec::new();
    for start in (0..limit).step_by(hop).take(3 * plan.max_segments) {
        let end = start + window;
        if end > len {
            break;
        }
        let segment = &samples[start..end];
        let mean_abs =
            segment.iter().map(|v| v.abs() as f64).sum::<f64>() / segment.len() as f64;
        if (mean_abs as f32) < plan.energy_floor {
            continue;
        }
        segments.push(segment);
        if segments.len() >= plan.max_segments {
            break;
        }
    }
    if segments.is_empty() {
        segments.push(&samples[..window.min(len)]);
    }
    segments
}

/// Produces per-segment speaker embeddings for a set of reference files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerEmbeddingExtractor {
    preprocess: PreprocessParams,
    plan: SegmentPlan,
}

impl SpeakerEmbeddingExtractor {
    pub fn new(preprocess: PreprocessParams, plan: SegmentPlan) -> Self {
        Self { preprocess, plan }
    }

    pub fn from_settings(settings: &ReferenceVoiceSettings) -> Self {
        Self::new(
            PreprocessParams::from_settings(settings),
            SegmentPlan::from_settings(settings),
        )
    }

    pub fn window(&self) -> DurationWindow {
        self.preprocess.window
    }

    /// Every segment embedding of every usable file, in file order.
    ///
    /// Files that fail to decode, are empty, or trip the encoder on any segment
    /// are skipped with a warning.
    pub fn extract(
        &self,
        references: &ReferenceAudioSet,
        encoder: &dyn SpeakerEncoder,
    ) -> Result<Vec<Vec<f32>>, VoiceError> {
        let preprocessor = AudioPreprocessor::new(self.preprocess, encoder.sample_rate());
        let mut embeddings = Vec::new();
        for path in references.paths() {
            match self.embed_file(path, &preprocessor, encoder) {
                Ok(file_embeddings) => {
                    debug!(
                        "Embedded {} segment(s) from {}",
                        file_embeddings.len(),
                        path.display()
                    );
                    embeddings.extend(file_embeddings);
                }
                Err(err) => warn!("Skipping reference {}: {err}", path.display()),
            }
        }
        if embeddings.is_empty() {
            return Err(VoiceError::NoValidEmbeddings {
                files: references.len(),
            });
        }
        Ok(embeddings)
    }

    fn embed_file(
        &self,
        path: &Path,
        preprocessor: &AudioPreprocessor,
        encoder: &dyn SpeakerEncoder,
    ) -> Result<Vec<Vec<f32>>, VoiceError> {
        let audio = decode_mono(path).map_err(|message| VoiceError::Decode {
            path: path.to_path_buf(),
            message,
        })?;
        let cleaned = preprocessor.process(&audio);
        if cleaned.is_empty() {
            return Err(VoiceError::Decode {
                path: path.to_path_buf(),
                message: "no samples after preprocessing".to_string(),
            });
        }
        segment_for_embedding(&cleaned, preprocessor.target_rate(), &self.plan)
            .into_iter()
            .map(|segment| {
                encoder.embed(segment).map_err(|message| VoiceError::Encoder {
                    encoder: encoder.name().to_string(),
                    message,
                })
            })
            .collect()
    }
}
