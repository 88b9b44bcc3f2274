use std::path::Path;

use ndarray::Array2;
use serde::Deserialize;

use crate::dsp::MelSpectrogram;

pub const PREPROCESSOR_CONFIG_FILE: &str = "preprocessor_config.json";

const LOG_FLOOR: f32 = 1e-10;
const DYNAMIC_RANGE: f32 = 8.0;

/// Feature extractor settings as stored next to the model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureExtractorConfig {
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,
    /// Mel bands per frame.
    #[serde(default = "default_feature_size")]
    pub feature_size: usize,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    /// Longest audio considered, in seconds.
    #[serde(default = "default_chunk_length")]
    pub chunk_length: u32,
}

fn default_sampling_rate() -> u32 {
    16_000
}

fn default_feature_size() -> usize {
    80
}

fn default_n_fft() -> usize {
    400
}

fn default_hop_length() -> usize {
    160
}

fn default_chunk_length() -> u32 {
    30
}

impl Default for FeatureExtractorConfig {
    fn default() -> Self {
        Self {
            sampling_rate: default_sampling_rate(),
            feature_size: default_feature_size(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            chunk_length: default_chunk_length(),
        }
    }
}

impl FeatureExtractorConfig {
    /// Read `preprocessor_config.json` from `dir`; defaults when the file is absent.
    pub fn load_from_dir(dir: &Path) -> Result<Self, String> {
        let path = dir.join(PREPROCESSOR_CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(format!("Failed to read {}: {err}", path.display())),
        };
        let config: Self = serde_json::from_str(&data)
            .map_err(|err| format!("Invalid {}: {err}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sampling_rate == 0 {
            return Err("sampling_rate must be positive".to_string());
        }
        if self.feature_size == 0 || self.n_fft < 2 || self.hop_length == 0 {
            return Err("feature_size, n_fft and hop_length must be positive".to_string());
        }
        Ok(())
    }
}

/// Whisper-style normalized log-mel features.
pub struct LogMelFeatures {
    config: FeatureExtractorConfig,
    mel: MelSpectrogram,
}

impl LogMelFeatures {
    pub fn new(config: FeatureExtractorConfig) -> Result<Self, String> {
        config.validate()?;
        let mel = MelSpectrogram::new(
            config.sampling_rate,
            config.n_fft,
            config.hop_length,
            config.feature_size,
        )?;
        Ok(Self { config, mel })
    }

    pub fn sampling_rate(&self) -> u32 {
        self.config.sampling_rate
    }

    pub fn n_mels(&self) -> usize {
        self.config.feature_size
    }

    fn max_samples(&self) -> usize {
        self.config.chunk_length as usize * self.config.sampling_rate as usize
    }

    /// `(frames, n_mels)` features of mono audio at [`Self::sampling_rate`].
    ///
    /// Input past `chunk_length` seconds is ignored.
    pub fn extract(&self, samples: &[f32]) -> Array2<f32> {
        let limit = samples.len().min(self.max_samples());
        let mut features = self.mel.power(&samples[..limit]);
        features.mapv_inplace(|value| value.max(LOG_FLOOR).log10());
        let peak = features.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - DYNAMIC_RANGE;
        features.mapv_inplace(|value| (value.max(floor) + 4.0) / 4.0);
        features
    }
}
