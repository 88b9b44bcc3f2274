//! TOML configuration for the voice core, layered under environment overrides.

mod defaults;
mod env;
mod errors;
mod types;

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::app_dirs;

pub use env::{
    EnvOverrides, SER_LOAD_TIMEOUT_SECS, SER_MODEL_DIR, SER_TIMEOUT_SECS, TTS_ENABLED,
    TTS_MODEL_COMMAND, TTS_OUT_FORMAT, TTS_REF_DIR, TTS_REF_WAVS,
};
pub use errors::ConfigError;
pub use types::{
    Concatenation, EmotionSettings, EncoderKind, OutputFormat, ReferenceVoiceSettings,
    SpeechModelSettings, TimbreSettings, TtsSettings, VoiceConfig,
};

/// Default filename used to store the voice configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the configuration file path inside the app root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(|err| {
        warn!("App directory unavailable: {err}");
        ConfigError::NoConfigDir
    })?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load the config file (defaults when missing) and apply environment overrides.
pub fn load() -> Result<VoiceConfig, ConfigError> {
    let path = config_path()?;
    let mut config = load_from_path(&path)?;
    EnvOverrides::from_env().apply(&mut config);
    Ok(config.normalized())
}

/// Read a config file without consulting the environment; missing files yield defaults.
pub fn load_from_path(path: &Path) -> Result<VoiceConfig, ConfigError> {
    if !path.exists() {
        return Ok(VoiceConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<VoiceConfig>(&text)
        .map(VoiceConfig::normalized)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
}

/// Write the TOML file atomically so a crash never leaves a half-written config.
pub fn save_to_path(config: &VoiceConfig, path: &Path) -> Result<(), ConfigError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    file.write_all(data.as_bytes()).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    file.persist(path)
        .map_err(|err| write_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from_path(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, VoiceConfig::default());
        assert_eq!(config.tts.output_format, OutputFormat::Wav);
        assert_eq!(config.ser.load_timeout_secs, 120);
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[tts]\nmax_chunk_tokens = 120\nconcatenation = \"crossfade\"\n\n[voice]\nencoders = [\"log-mel-stats\"]\n",
        )
        .unwrap();
        let config = load_from_path(&path).unwrap();
        assert_eq!(config.tts.max_chunk_tokens, 120);
        assert_eq!(config.tts.concatenation, Concatenation::Crossfade);
        assert_eq!(config.tts.pause_ms, 120.0);
        assert_eq!(config.voice.encoders, vec![EncoderKind::LogMelStats]);
        assert_eq!(config.voice.memory_cache_entries, 8);
    }

    #[test]
    fn save_then_load_preserves_edits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = VoiceConfig::default();
        config.tts.pitch_shift_semitones = -2.0;
        config.voice.ref_dir = Some(PathBuf::from("/voices/calm"));
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[tts\n").unwrap();
        match load_from_path(&path) {
            Err(ConfigError::ParseToml { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn normalization_clamps_out_of_range_values() {
        let mut config = VoiceConfig::default();
        config.tts.pitch_shift_semitones = 40.0;
        config.tts.max_chunk_tokens = 0;
        config.voice.max_ref_seconds = 1.0;
        let config = config.normalized();
        assert_eq!(config.tts.pitch_shift_semitones, 12.0);
        assert_eq!(config.tts.max_chunk_tokens, 1);
        assert_eq!(config.voice.max_ref_seconds, config.voice.min_ref_seconds);
    }
}
