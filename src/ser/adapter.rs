use std::collections::BTreeMap;
use std::path::Path;

use ndarray::Array2;
use serde::Deserialize;
use tracing::{debug, warn};

use super::labels::{EmotionLabel, LABEL_COUNT};
use super::model::{ClassificationHead, FrameEncoder};

pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
pub const ADAPTER_WEIGHTS_FILE: &str = "adapter_model.json";

/// Low-rank adapter settings. Older exports omit the hidden size or call it `d_model`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdapterConfig {
    pub r: usize,
    pub lora_alpha: f32,
    #[serde(default, alias = "d_model")]
    pub hidden_size: Option<usize>,
    #[serde(default)]
    pub id2label: BTreeMap<usize, String>,
}

impl AdapterConfig {
    /// Take the hidden size from the encoder when absent and pin the label map
    /// to the fixed label order.
    pub fn fix_up(&mut self, encoder: &FrameEncoder) -> Result<(), String> {
        match self.hidden_size {
            None => {
                debug!("Adapter config has no hidden size; using {}", encoder.d_model());
                self.hidden_size = Some(encoder.d_model());
            }
            Some(size) if size != encoder.d_model() => {
                return Err(format!(
                    "Adapter hidden size {size} does not match encoder width {}",
                    encoder.d_model()
                ));
            }
            Some(_) => {}
        }
        self.id2label = EmotionLabel::ALL
            .iter()
            .map(|label| (label.index(), label.as_str().to_string()))
            .collect();
        Ok(())
    }

    fn scale(&self) -> f32 {
        self.lora_alpha / self.r.max(1) as f32
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterWeights {
    /// Row-major `r x n_mels`.
    pub lora_a: Vec<f32>,
    /// Row-major `d_model x r`.
    pub lora_b: Vec<f32>,
    /// Row-major `labels x d_model`.
    pub head_weight: Vec<f32>,
    pub head_bias: Vec<f32>,
}

/// Fine-tuned weights applied on top of the pretrained encoder.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub config: AdapterConfig,
    pub weights: AdapterWeights,
}

impl Adapter {
    pub fn load(dir: &Path) -> Result<Self, String> {
        let config: AdapterConfig = read_json(&dir.join(ADAPTER_CONFIG_FILE))?;
        let weights: AdapterWeights = read_json(&dir.join(ADAPTER_WEIGHTS_FILE))?;
        if config.r == 0 {
            return Err("adapter rank must be positive".to_string());
        }
        Ok(Self { config, weights })
    }

    /// Merge the low-rank update into `encoder` and load the head weights.
    ///
    /// Nothing is modified when any shape is inconsistent.
    pub fn attach(
        mut self,
        encoder: &mut FrameEncoder,
        head: &mut ClassificationHead,
    ) -> Result<(), String> {
        self.config.fix_up(encoder)?;
        let rank = self.config.r;
        let d_model = encoder.d_model();
        let n_mels = encoder.n_mels();
        let a = Array2::from_shape_vec((rank, n_mels), self.weights.lora_a)
            .map_err(|err| format!("lora_a: {err}"))?;
        let b = Array2::from_shape_vec((d_model, rank), self.weights.lora_b)
            .map_err(|err| format!("lora_b: {err}"))?;
        if self.weights.head_weight.len() != LABEL_COUNT * d_model
            || self.weights.head_bias.len() != LABEL_COUNT
        {
            return Err("head weights do not match the label count and encoder width".to_string());
        }
        let delta = b.dot(&a) * self.config.scale();
        if delta.iter().any(|v| !v.is_finite()) {
            return Err("adapter update is not finite".to_string());
        }
        head.set_weights(self.weights.head_weight, self.weights.head_bias)?;
        encoder.merge_delta(&delta)?;
        Ok(())
    }
}

/// Attach the adapter in `dir` if present; failures keep the un-adapted model.
pub fn attach_optional(dir: &Path, encoder: &mut FrameEncoder, head: &mut ClassificationHead) {
    if !dir.join(ADAPTER_CONFIG_FILE).is_file() {
        warn!("No emotion adapter in {}; using the base head", dir.display());
        return;
    }
    let result = Adapter::load(dir).and_then(|adapter| adapter.attach(encoder, head));
    if let Err(err) = result {
        warn!("Ignoring emotion adapter in {}: {err}", dir.display());
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&data).map_err(|err| format!("Invalid {}: {err}", path.display()))
}
