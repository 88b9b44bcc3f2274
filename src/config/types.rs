use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Complete configuration for the voice core.
///
/// Config keys (TOML): `[tts]`, `[voice]`, `[ser]`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub tts: TtsSettings,
    #[serde(default)]
    pub voice: ReferenceVoiceSettings,
    #[serde(default)]
    pub ser: EmotionSettings,
}

impl VoiceConfig {
    /// Clamp values into ranges the pipeline can work with.
    pub fn normalized(mut self) -> Self {
        let tts = &mut self.tts;
        tts.max_chunk_tokens = tts.max_chunk_tokens.max(1);
        tts.hard_token_limit = tts.hard_token_limit.max(tts.max_chunk_tokens);
        tts.pause_ms = tts.pause_ms.max(0.0);
        tts.edge_fade_ms = tts.edge_fade_ms.max(0.0);
        tts.crossfade_ms = tts.crossfade_ms.max(0.0);
        tts.pitch_shift_semitones = if tts.pitch_shift_semitones.is_finite() {
            tts.pitch_shift_semitones.clamp(-MAX_SEMITONES, MAX_SEMITONES)
        } else {
            0.0
        };
        tts.model.sample_rate = tts.model.sample_rate.max(1);

        let voice = &mut self.voice;
        voice.memory_cache_entries = voice.memory_cache_entries.max(1);
        voice.min_ref_seconds = voice.min_ref_seconds.max(0.0);
        voice.max_ref_seconds = voice.max_ref_seconds.max(voice.min_ref_seconds);
        voice.max_segments = voice.max_segments.max(1);
        if voice.segment_hop_seconds <= 0.0 {
            voice.segment_hop_seconds = default_segment_hop_seconds();
        }
        if voice.segment_seconds <= 0.0 {
            voice.segment_seconds = default_segment_seconds();
        }
        if voice.vad_frame_ms <= 0.0 {
            voice.vad_frame_ms = default_vad_frame_ms();
        }
        voice.encoders.dedup();
        self
    }
}

/// Output container requested for synthesized speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn from_env(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wav" | ".wav" => Some(Self::Wav),
            "mp3" | ".mp3" => Some(Self::Mp3),
            _ => None,
        }
    }
}

/// How synthesized chunks are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Concatenation {
    /// Short silence between chunks plus millisecond edge fades.
    #[default]
    Pause,
    /// Legacy linear crossfade; smears phonemes at the seams.
    Crossfade,
}

/// Speaker encoders in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderKind {
    /// Statistics pooling with a learned projection loaded from disk.
    Projection,
    /// Statistics pooling with a fixed seeded projection.
    LogMelStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Named voice folder under the reference root used when callers pass none.
    #[serde(default)]
    pub default_voice: Option<String>,
    #[serde(default = "default_max_chunk_tokens")]
    pub max_chunk_tokens: usize,
    /// Hard ceiling on tokens handed to the speech model per chunk.
    #[serde(default = "default_hard_token_limit")]
    pub hard_token_limit: usize,
    #[serde(default = "default_chunk_target_rms")]
    pub chunk_target_rms: f32,
    #[serde(default)]
    pub concatenation: Concatenation,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: f32,
    #[serde(default = "default_edge_fade_ms")]
    pub edge_fade_ms: f32,
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: f32,
    /// Post-processing is skipped when the chunked text is longer than this.
    #[serde(default = "default_long_form_chars")]
    pub long_form_chars: usize,
    #[serde(default = "default_pitch_shift_semitones")]
    pub pitch_shift_semitones: f32,
    #[serde(default)]
    pub timbre: TimbreSettings,
    #[serde(default)]
    pub model: SpeechModelSettings,
}

impl Default for TtsSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            output_format: OutputFormat::default(),
            default_voice: None,
            max_chunk_tokens: default_max_chunk_tokens(),
            hard_token_limit: default_hard_token_limit(),
            chunk_target_rms: default_chunk_target_rms(),
            concatenation: Concatenation::default(),
            pause_ms: default_pause_ms(),
            edge_fade_ms: default_edge_fade_ms(),
            crossfade_ms: default_crossfade_ms(),
            long_form_chars: default_long_form_chars(),
            pitch_shift_semitones: default_pitch_shift_semitones(),
            timbre: TimbreSettings::default(),
            model: SpeechModelSettings::default(),
        }
    }
}

/// Fixed EQ + saturation chain darkening the synthesized voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimbreSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_treble_cut_db")]
    pub treble_cut_db: f32,
    #[serde(default = "default_presence_cut_db")]
    pub presence_cut_db: f32,
    #[serde(default = "default_body_boost_db")]
    pub body_boost_db: f32,
}

impl Default for TimbreSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            treble_cut_db: default_treble_cut_db(),
            presence_cut_db: default_presence_cut_db(),
            body_boost_db: default_body_boost_db(),
        }
    }
}

/// External process producing speech for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechModelSettings {
    #[serde(default)]
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_model_sample_rate")]
    pub sample_rate: u32,
}

impl Default for SpeechModelSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            sample_rate: default_model_sample_rate(),
        }
    }
}

/// Reference audio, preprocessing and embedding cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVoiceSettings {
    /// Explicit reference files; highest priority after the caller's own list.
    #[serde(default)]
    pub ref_wavs: Vec<PathBuf>,
    /// Directory whose `*.wav` files form the reference set.
    #[serde(default)]
    pub ref_dir: Option<PathBuf>,
    /// Root holding named voice folders; defaults to the app `voice_refs` dir.
    #[serde(default)]
    pub refs_root: Option<PathBuf>,
    /// On-disk embedding cache; defaults to the app `voice_emb_cache` dir.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_memory_cache_entries")]
    pub memory_cache_entries: usize,
    #[serde(default = "default_min_ref_seconds")]
    pub min_ref_seconds: f32,
    #[serde(default = "default_max_ref_seconds")]
    pub max_ref_seconds: f32,
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: f32,
    #[serde(default = "default_segment_hop_seconds")]
    pub segment_hop_seconds: f32,
    #[serde(default = "default_max_segments")]
    pub max_segments: usize,
    #[serde(default = "default_segment_energy_floor")]
    pub segment_energy_floor: f32,
    #[serde(default = "default_trim_top_db")]
    pub trim_top_db: f32,
    #[serde(default = "default_vad_frame_ms")]
    pub vad_frame_ms: f32,
    #[serde(default = "default_vad_median_ratio")]
    pub vad_median_ratio: f32,
    #[serde(default = "default_reference_target_rms")]
    pub target_rms: f32,
    #[serde(default = "default_encoders")]
    pub encoders: Vec<EncoderKind>,
    #[serde(default)]
    pub projection_weights: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub require_real_embedding: bool,
    #[serde(default = "default_true")]
    pub allow_random_fallback: bool,
    #[serde(default)]
    pub random_seed: u64,
}

impl Default for ReferenceVoiceSettings {
    fn default() -> Self {
        Self {
            ref_wavs: Vec::new(),
            ref_dir: None,
            refs_root: None,
            cache_dir: None,
            memory_cache_entries: default_memory_cache_entries(),
            min_ref_seconds: default_min_ref_seconds(),
            max_ref_seconds: default_max_ref_seconds(),
            segment_seconds: default_segment_seconds(),
            segment_hop_seconds: default_segment_hop_seconds(),
            max_segments: default_max_segments(),
            segment_energy_floor: default_segment_energy_floor(),
            trim_top_db: default_trim_top_db(),
            vad_frame_ms: default_vad_frame_ms(),
            vad_median_ratio: default_vad_median_ratio(),
            target_rms: default_reference_target_rms(),
            encoders: default_encoders(),
            projection_weights: None,
            require_real_embedding: default_true(),
            allow_random_fallback: default_true(),
            random_seed: 0,
        }
    }
}

/// Emotion model location and time budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSettings {
    /// Model directory; defaults to the app `models/ser` dir.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    #[serde(default = "default_adapter_subdir")]
    pub adapter_subdir: String,
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
    #[serde(default = "default_emotion_timeout_secs")]
    pub timeout_secs: u64,
}

impl EmotionSettings {
    pub fn load_timeout(&self) -> Duration {
        secs(self.load_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }
}

impl Default for EmotionSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            adapter_subdir: default_adapter_subdir(),
            load_timeout_secs: default_load_timeout_secs(),
            timeout_secs: default_emotion_timeout_secs(),
        }
    }
}
