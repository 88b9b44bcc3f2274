use std::time::Duration;

use super::types::EncoderKind;

pub(super) const MAX_SEMITONES: f32 = 12.0;

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_max_chunk_tokens() -> usize {
    280
}

pub(super) fn default_hard_token_limit() -> usize {
    600
}

pub(super) fn default_chunk_target_rms() -> f32 {
    0.045
}

pub(super) fn default_pause_ms() -> f32 {
    120.0
}

pub(super) fn default_edge_fade_ms() -> f32 {
    6.0
}

pub(super) fn default_crossfade_ms() -> f32 {
    15.0
}

pub(super) fn default_long_form_chars() -> usize {
    800
}

pub(super) fn default_pitch_shift_semitones() -> f32 {
    -1.0
}

pub(super) fn default_treble_cut_db() -> f32 {
    6.0
}

pub(super) fn default_presence_cut_db() -> f32 {
    3.0
}

pub(super) fn default_body_boost_db() -> f32 {
    2.5
}

pub(super) fn default_model_sample_rate() -> u32 {
    16_000
}

pub(super) fn default_memory_cache_entries() -> usize {
    8
}

pub(super) fn default_min_ref_seconds() -> f32 {
    5.0
}

pub(super) fn default_max_ref_seconds() -> f32 {
    20.0
}

pub(super) fn default_segment_seconds() -> f32 {
    2.0
}

pub(super) fn default_segment_hop_seconds() -> f32 {
    1.0
}

pub(super) fn default_max_segments() -> usize {
    6
}

pub(super) fn default_segment_energy_floor() -> f32 {
    1e-3
}

pub(super) fn default_trim_top_db() -> f32 {
    32.0
}

pub(super) fn default_vad_frame_ms() -> f32 {
    30.0
}

pub(super) fn default_vad_median_ratio() -> f32 {
    0.8
}

pub(super) fn default_reference_target_rms() -> f32 {
    0.05
}

pub(super) fn default_encoders() -> Vec<EncoderKind> {
    vec![EncoderKind::Projection, EncoderKind::LogMelStats]
}

pub(super) fn default_adapter_subdir() -> String {
    "adapter".to_string()
}

pub(super) fn default_load_timeout_secs() -> u64 {
    120
}

pub(super) fn default_emotion_timeout_secs() -> u64 {
    30
}

pub(super) fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}
