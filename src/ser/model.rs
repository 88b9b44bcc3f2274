use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use serde::Deserialize;

use super::features::LogMelFeatures;
use super::labels::{EmotionLabel, LABEL_COUNT};

pub const ENCODER_FILE: &str = "encoder.json";

/// Pretrained frame encoder weights as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct EncoderWeights {
    pub d_model: usize,
    pub n_mels: usize,
    /// Row-major `d_model x n_mels`.
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl EncoderWeights {
    pub fn validate(&self) -> Result<(), String> {
        if self.d_model == 0 || self.n_mels == 0 {
            return Err("d_model and n_mels must be positive".to_string());
        }
        if self.weights.len() != self.d_model * self.n_mels {
            return Err("weights length mismatch".to_string());
        }
        if self.bias.len() != self.d_model {
            return Err("bias length mismatch".to_string());
        }
        if self.weights.iter().chain(&self.bias).any(|v| !v.is_finite()) {
            return Err("weights must be finite".to_string());
        }
        Ok(())
    }
}

/// Per-frame projection of log-mel features into the model width.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    projection: Array2<f32>,
    bias: Array1<f32>,
}

impl FrameEncoder {
    pub fn load(path: &Path) -> Result<Self, String> {
        let data = std::fs::read_to_string(path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
        let weights: EncoderWeights = serde_json::from_str(&data)
            .map_err(|err| format!("Invalid {}: {err}", path.display()))?;
        Self::from_weights(weights)
    }

    pub fn from_weights(weights: EncoderWeights) -> Result<Self, String> {
        weights.validate()?;
        let projection = Array2::from_shape_vec((weights.d_model, weights.n_mels), weights.weights)
            .map_err(|err| err.to_string())?;
        Ok(Self {
            projection,
            bias: Array1::from(weights.bias),
        })
    }

    pub fn d_model(&self) -> usize {
        self.projection.nrows()
    }

    pub fn n_mels(&self) -> usize {
        self.projection.ncols()
    }

    /// Add a `d_model x n_mels` update to the projection.
    pub fn merge_delta(&mut self, delta: &Array2<f32>) -> Result<(), String> {
        if delta.dim() != self.projection.dim() {
            return Err(format!(
                "Delta shape {:?} does not match projection {:?}",
                delta.dim(),
                self.projection.dim()
            ));
        }
        self.projection += delta;
        Ok(())
    }

    /// `(frames, n_mels)` in, `(frames, d_model)` hidden states out.
    pub fn forward(&self, features: &Array2<f32>) -> Array2<f32> {
        let mut hidden = features.dot(&self.projection.t()) + &self.bias;
        hidden.mapv_inplace(gelu);
        hidden
    }
}

/// Linear classifier over mean-pooled hidden states.
#[derive(Debug, Clone)]
pub struct ClassificationHead {
    weight: Array2<f32>,
    bias: Array1<f32>,
    labels: Vec<EmotionLabel>,
}

impl ClassificationHead {
    /// All-zero head; predicts the uniform distribution until weights are loaded.
    pub fn zeros(d_model: usize) -> Self {
        Self {
            weight: Array2::zeros((LABEL_COUNT, d_model)),
            bias: Array1::zeros(LABEL_COUNT),
            labels: EmotionLabel::ALL.to_vec(),
        }
    }

    pub fn labels(&self) -> &[EmotionLabel] {
        &self.labels
    }

    pub fn set_weights(&mut self, weight: Vec<f32>, bias: Vec<f32>) -> Result<(), String> {
        let (labels, d_model) = self.weight.dim();
        if weight.len() != labels * d_model || bias.len() != labels {
            return Err(format!(
                "Head weights must be {labels}x{d_model} with {labels} biases"
            ));
        }
        self.weight =
            Array2::from_shape_vec((labels, d_model), weight).map_err(|err| err.to_string())?;
        self.bias = Array1::from(bias);
        Ok(())
    }

    pub fn logits(&self, pooled: &Array1<f32>) -> Array1<f32> {
        self.weight.dot(pooled) + &self.bias
    }
}

/// Encoder, head and feature extractor ready for inference.
pub struct EmotionModel {
    encoder: FrameEncoder,
    head: ClassificationHead,
    features: LogMelFeatures,
}

impl EmotionModel {
    pub fn new(
        encoder: FrameEncoder,
        head: ClassificationHead,
        features: LogMelFeatures,
    ) -> Result<Self, String> {
        if features.n_mels() != encoder.n_mels() {
            return Err(format!(
                "Feature extractor yields {} mel bands but the encoder expects {}",
                features.n_mels(),
                encoder.n_mels()
            ));
        }
        Ok(Self {
            encoder,
            head,
            features,
        })
    }

    pub fn sampling_rate(&self) -> u32 {
        self.features.sampling_rate()
    }

    /// Label probabilities for mono audio at [`Self::sampling_rate`].
    pub fn predict(&self, samples: &[f32]) -> Result<Vec<f32>, String> {
        let features = self.features.extract(samples);
        let hidden = self.encoder.forward(&features);
        let pooled = hidden
            .mean_axis(Axis(0))
            .ok_or_else(|| "no frames to pool".to_string())?;
        let logits = self.head.logits(&pooled);
        let probabilities = softmax(logits.as_slice().unwrap_or(&[]));
        if probabilities.len() != self.head.labels().len() {
            return Err("head produced no logits".to_string());
        }
        Ok(probabilities)
    }
}

fn gelu(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return vec![1.0 / logits.len().max(1) as f32; logits.len()];
    }
    exps.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::features::FeatureExtractorConfig;

    fn encoder(d_model: usize, n_mels: usize) -> FrameEncoder {
        FrameEncoder::from_weights(EncoderWeights {
            d_model,
            n_mels,
            weights: (0..d_model * n_mels).map(|i| (i % 7) as f32 * 0.01).collect(),
            bias: vec![0.1; d_model],
        })
        .unwrap()
    }

    #[test]
    fn mismatched_weights_are_rejected() {
        let weights = EncoderWeights {
            d_model: 4,
            n_mels: 3,
            weights: vec![0.0; 11],
            bias: vec![0.0; 4],
        };
        assert!(FrameEncoder::from_weights(weights).is_err());
    }

    #[test]
    fn zero_head_predicts_uniform() {
        let features = LogMelFeatures::new(FeatureExtractorConfig::default()).unwrap();
        let model = EmotionModel::new(encoder(16, 80), ClassificationHead::zeros(16), features)
            .unwrap();
        let probabilities = model.predict(&vec![0.1; 8_000]).unwrap();
        assert_eq!(probabilities.len(), 8);
        assert!(probabilities.iter().all(|p| (p - 0.125).abs() < 1e-6));
    }

    #[test]
    fn head_bias_shifts_prediction() {
        let features = LogMelFeatures::new(FeatureExtractorConfig::default()).unwrap();
        let mut head = ClassificationHead::zeros(16);
        let mut bias = vec![0.0; 8];
        bias[EmotionLabel::Calm.index()] = 5.0;
        head.set_weights(vec![0.0; 8 * 16], bias).unwrap();
        let model = EmotionModel::new(encoder(16, 80), head, features).unwrap();
        let probabilities = model.predict(&vec![0.1; 8_000]).unwrap();
        assert!(probabilities[EmotionLabel::Calm.index()] > 0.9);
    }

    #[test]
    fn mel_mismatch_is_rejected() {
        let features = LogMelFeatures::new(FeatureExtractorConfig::default()).unwrap();
        assert!(EmotionModel::new(encoder(4, 40), ClassificationHead::zeros(4), features).is_err());
    }

    #[test]
    fn softmax_sums_to_one() {
        let out = softmax(&[1.0, 2.0, 3.0]);
        assert!((out.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(out[2] > out[1] && out[1] > out[0]);
    }
}
