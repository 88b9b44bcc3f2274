use std::path::PathBuf;

use tracing::warn;

use super::types::{OutputFormat, VoiceConfig};

pub const TTS_ENABLED: &str = "TTS_ENABLED";
pub const TTS_OUT_FORMAT: &str = "TTS_OUT_FORMAT";
pub const TTS_REF_WAVS: &str = "TTS_REF_WAVS";
pub const TTS_REF_DIR: &str = "TTS_REF_DIR";
pub const TTS_MODEL_COMMAND: &str = "TTS_MODEL_COMMAND";
pub const SER_MODEL_DIR: &str = "SER_MODEL_DIR";
pub const SER_LOAD_TIMEOUT_SECS: &str = "SER_LOAD_TIMEOUT_SECS";
pub const SER_TIMEOUT_SECS: &str = "SER_TIMEOUT_SECS";

/// Values read from the process environment that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub tts_enabled: Option<bool>,
    pub output_format: Option<OutputFormat>,
    pub ref_wavs: Option<Vec<PathBuf>>,
    pub ref_dir: Option<PathBuf>,
    pub model_command: Option<PathBuf>,
    pub ser_model_dir: Option<PathBuf>,
    pub ser_load_timeout_secs: Option<u64>,
    pub ser_timeout_secs: Option<u64>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build overrides from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            tts_enabled: get(TTS_ENABLED).and_then(|value| parse_flag(TTS_ENABLED, &value)),
            output_format: get(TTS_OUT_FORMAT).and_then(|value| {
                let parsed = OutputFormat::from_env(&value);
                if parsed.is_none() {
                    warn!("Ignoring {TTS_OUT_FORMAT}={value}: expected wav or mp3");
                }
                parsed
            }),
            ref_wavs: get(TTS_REF_WAVS).map(|value| split_path_list(&value)),
            ref_dir: get(TTS_REF_DIR).map(PathBuf::from),
            model_command: get(TTS_MODEL_COMMAND).map(PathBuf::from),
            ser_model_dir: get(SER_MODEL_DIR).map(PathBuf::from),
            ser_load_timeout_secs: get(SER_LOAD_TIMEOUT_SECS)
                .and_then(|value| parse_secs(SER_LOAD_TIMEOUT_SECS, &value)),
            ser_timeout_secs: get(SER_TIMEOUT_SECS)
                .and_then(|value| parse_secs(SER_TIMEOUT_SECS, &value)),
        }
    }

    pub fn apply(&self, config: &mut VoiceConfig) {
        if let Some(enabled) = self.tts_enabled {
            config.tts.enabled = enabled;
        }
        if let Some(format) = self.output_format {
            config.tts.output_format = format;
        }
        if let Some(paths) = &self.ref_wavs {
            config.voice.ref_wavs = paths.clone();
        }
        if let Some(dir) = &self.ref_dir {
            config.voice.ref_dir = Some(dir.clone());
        }
        if let Some(command) = &self.model_command {
            config.tts.model.command = Some(command.clone());
        }
        if let Some(dir) = &self.ser_model_dir {
            config.ser.model_dir = Some(dir.clone());
        }
        if let Some(secs) = self.ser_load_timeout_secs {
            config.ser.load_timeout_secs = secs;
        }
        if let Some(secs) = self.ser_timeout_secs {
            config.ser.timeout_secs = secs;
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!("Ignoring {key}={value}: expected a boolean");
            None
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Option<u64> {
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Some(secs.ceil() as u64),
        _ => {
            warn!("Ignoring {key}={value}: expected non-negative seconds");
            None
        }
    }
}

/// Comma-separated list; blank entries are dropped.
fn split_path_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}
