use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::VoiceError;
use super::vector::l2_normalize;
use crate::config::{EncoderKind, ReferenceVoiceSettings};
use crate::dsp::MelSpectrogram;

/// Length of every speaker embedding handed to the speech model.
pub const EMBEDDING_DIM: usize = 512;
/// Rate all shipped encoders expect their input at.
pub const ENCODER_SAMPLE_RATE: u32 = 16_000;

const STATS_N_FFT: usize = 400;
const STATS_HOP: usize = 160;
const STATS_MELS: usize = 40;
const STATS_DIM: usize = STATS_MELS * 2;
const LOG_FLOOR: f32 = 1e-10;
const FIXED_PROJECTION_SEED: u64 = 0x5eed_0f_5eed;

/// Maps one speech segment to a fixed-length speaker vector.
pub trait SpeakerEncoder: Send + Sync {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    fn dim(&self) -> usize;

    /// False for encoders that ignore the audio.
    fn is_real(&self) -> bool {
        true
    }

    /// Name plus anything that changes the output for the same audio.
    fn identity(&self) -> String {
        self.name().to_string()
    }

    fn embed(&self, segment: &[f32]) -> Result<Vec<f32>, String>;
}

/// Build the first usable encoder from `settings.encoders`, in order.
///
/// Falls back to the seeded random encoder only when real embeddings are not
/// required and random fallback is allowed.
pub fn select_encoder(settings: &ReferenceVoiceSettings) -> Result<Arc<dyn SpeakerEncoder>, VoiceError> {
    let mut skipped = Vec::new();
    for kind in &settings.encoders {
        match build_encoder(*kind, settings) {
            Ok(encoder) => {
                info!("Using speaker encoder {}", encoder.name());
                return Ok(encoder);
            }
            Err(reason) => {
                warn!("Speaker encoder {kind:?} unavailable: {reason}");
                skipped.push(format!("{kind:?}: {reason}"));
            }
        }
    }
    if !settings.require_real_embedding && settings.allow_random_fallback {
        warn!("No real speaker encoder; using seeded random embeddings");
        return Ok(Arc::new(RandomEncoder::new(settings.random_seed)));
    }
    let reason = if skipped.is_empty() {
        "no encoders configured".to_string()
    } else {
        skipped.join("; ")
    };
    Err(VoiceError::NoEncoder { reason })
}

fn build_encoder(
    kind: EncoderKind,
    settings: &ReferenceVoiceSettings,
) -> Result<Arc<dyn SpeakerEncoder>, String> {
    match kind {
        EncoderKind::Projection => {
            let path = settings
                .projection_weights
                .as_deref()
                .ok_or_else(|| "no projection weights configured".to_string())?;
            Ok(Arc::new(ProjectionEncoder::load(path)?))
        }
        EncoderKind::LogMelStats => Ok(Arc::new(LogMelStatsEncoder::new()?)),
    }
}

/// Per-band mean and standard deviation of log-mel frames.
struct StatsPooling {
    mel: MelSpectrogram,
}

impl StatsPooling {
    fn new() -> Result<Self, String> {
        Ok(Self {
            mel: MelSpectrogram::new(ENCODER_SAMPLE_RATE, STATS_N_FFT, STATS_HOP, STATS_MELS)?,
        })
    }

    /// Means are centered across bands so overall loudness does not shift the vector.
    fn pool(&self, segment: &[f32]) -> Result<Array1<f32>, String> {
        if segment.is_empty() {
            return Err("empty segment".to_string());
        }
        let log_mel = self.mel.power(segment).mapv(|e| e.max(LOG_FLOOR).ln());
        let frames = log_mel.nrows() as f32;
        let mut stats = Array1::<f32>::zeros(STATS_DIM);
        for (band, column) in log_mel.columns().into_iter().enumerate() {
            let mean = column.sum() / frames;
            let var = column.mapv(|v| (v - mean).powi(2)).sum() / frames;
            stats[band] = mean;
            stats[STATS_MELS + band] = var.sqrt();
        }
        let level = stats.slice(ndarray::s![..STATS_MELS]).sum() / STATS_MELS as f32;
        stats
            .slice_mut(ndarray::s![..STATS_MELS])
            .mapv_inplace(|v| v - level);
        if stats.iter().any(|v| !v.is_finite()) {
            return Err("non-finite statistics".to_string());
        }
        Ok(stats)
    }
}

/// Statistics pooling followed by a fixed seeded projection to 512 dimensions.
pub struct LogMelStatsEncoder {
    pooling: StatsPooling,
    projection: Array2<f32>,
}

impl LogMelStatsEncoder {
    pub fn new() -> Result<Self, String> {
        let mut rng = StdRng::seed_from_u64(FIXED_PROJECTION_SEED);
        let scale = 1.0 / (STATS_DIM as f32).sqrt();
        let projection =
            Array2::from_shape_simple_fn((EMBEDDING_DIM, STATS_DIM), || gaussian(&mut rng) * scale);
        Ok(Self {
            pooling: StatsPooling::new()?,
            projection,
        })
    }
}

impl SpeakerEncoder for LogMelStatsEncoder {
    fn name(&self) -> &str {
        "logmel-stats"
    }

    fn sample_rate(&self) -> u32 {
        ENCODER_SAMPLE_RATE
    }

    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, segment: &[f32]) -> Result<Vec<f32>, String> {
        let stats = self.pooling.pool(segment)?;
        let mut out = self.projection.dot(&stats).to_vec();
        l2_normalize(&mut out);
        Ok(out)
    }
}

/// Learned affine projection of pooled statistics, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionWeights {
    pub input_dim: usize,
    pub output_dim: usize,
    /// Row-major `output_dim x input_dim`.
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl ProjectionWeights {
    pub fn validate(&self) -> Result<(), String> {
        if self.input_dim != STATS_DIM {
            return Err(format!(
                "input_dim {} does not match pooled statistics ({STATS_DIM})",
                self.input_dim
            ));
        }
        if self.output_dim == 0 {
            return Err("output_dim must be positive".to_string());
        }
        if self.weights.len() != self.input_dim * self.output_dim {
            return Err(format!(
                "weights has {} values, expected {}",
                self.weights.len(),
                self.input_dim * self.output_dim
            ));
        }
        if self.bias.len() != self.output_dim {
            return Err(format!(
                "bias has {} values, expected {}",
                self.bias.len(),
                self.output_dim
            ));
        }
        if self.weights.iter().chain(&self.bias).any(|v| !v.is_finite()) {
            return Err("weights contain non-finite values".to_string());
        }
        Ok(())
    }
}

pub struct ProjectionEncoder {
    pooling: StatsPooling,
    weights: Array2<f32>,
    bias: Array1<f32>,
    weights_hash: String,
}

impl ProjectionEncoder {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
        let parsed: ProjectionWeights = serde_json::from_str(&text)
            .map_err(|err| format!("Invalid projection weights {}: {err}", path.display()))?;
        Self::from_weights(parsed)
    }

    pub fn from_weights(parsed: ProjectionWeights) -> Result<Self, String> {
        parsed.validate()?;
        let weights_hash = weights_hash(&parsed);
        let weights = Array2::from_shape_vec((parsed.output_dim, parsed.input_dim), parsed.weights)
            .map_err(|err| err.to_string())?;
        Ok(Self {
            pooling: StatsPooling::new()?,
            weights,
            bias: Array1::from(parsed.bias),
            weights_hash,
        })
    }
}

fn weights_hash(parsed: &ProjectionWeights) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(parsed.input_dim as u64).to_le_bytes());
    hasher.update(&(parsed.output_dim as u64).to_le_bytes());
    for value in parsed.weights.iter().chain(&parsed.bias) {
        hasher.update(&value.to_le_bytes());
    }
    hasher.finalize().to_hex()[..16].to_string()
}

impl SpeakerEncoder for ProjectionEncoder {
    fn name(&self) -> &str {
        "projection"
    }

    fn identity(&self) -> String {
        format!("projection:{}", self.weights_hash)
    }

    fn sample_rate(&self) -> u32 {
        ENCODER_SAMPLE_RATE
    }

    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed(&self, segment: &[f32]) -> Result<Vec<f32>, String> {
        let stats = self.pooling.pool(segment)?;
        let mut out = (self.weights.dot(&stats) + &self.bias).to_vec();
        out.resize(EMBEDDING_DIM, 0.0);
        l2_normalize(&mut out);
        Ok(out)
    }
}

/// Ignores the audio and returns the same seeded Gaussian vector every time.
pub struct RandomEncoder {
    seed: u64,
}

impl RandomEncoder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl SpeakerEncoder for RandomEncoder {
    fn name(&self) -> &str {
        "random:seeded"
    }

    fn sample_rate(&self) -> u32 {
        ENCODER_SAMPLE_RATE
    }

    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn is_real(&self) -> bool {
        false
    }

    fn embed(&self, _segment: &[f32]) -> Result<Vec<f32>, String> {
        Ok(seeded_gaussian(self.seed, EMBEDDING_DIM))
    }
}

/// Unit-length Gaussian vector from a generator seeded just before drawing.
pub fn seeded_gaussian(seed: u64, dim: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out: Vec<f32> = (0..dim).map(|_| gaussian(&mut rng)).collect();
    l2_normalize(&mut out);
    out
}

/// Box-Muller standard normal sample.
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()) as f32
}
