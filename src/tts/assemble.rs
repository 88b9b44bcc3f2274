use crate::config::{Concatenation, TtsSettings};
use crate::signal::millis_to_samples;

/// Joins per-chunk waveforms into one utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assembly {
    /// Silence between chunks, short linear fades at each chunk edge.
    Pause { pause_ms: f32, edge_fade_ms: f32 },
    /// Linear crossfade across each seam.
    Crossfade { fade_ms: f32 },
}

impl Assembly {
    pub fn from_settings(settings: &TtsSettings) -> Self {
        match settings.concatenation {
            Concatenation::Pause => Self::Pause {
                pause_ms: settings.pause_ms,
                edge_fade_ms: settings.edge_fade_ms,
            },
            Concatenation::Crossfade => Self::Crossfade {
                fade_ms: settings.crossfade_ms,
            },
        }
    }

    /// Samples inserted between two chunks (negative overlap for crossfades is not counted).
    pub fn gap_samples(&self, sample_rate: u32) -> usize {
        match *self {
            Self::Pause { pause_ms, .. } => millis_to_samples(pause_ms, sample_rate).max(1),
            Self::Crossfade { .. } => 0,
        }
    }

    /// Empty input yields a single zero sample.
    pub fn join(&self, chunks: Vec<Vec<f32>>, sample_rate: u32) -> Vec<f32> {
        if chunks.is_empty() {
            return vec![0.0];
        }
        match *self {
            Self::Pause { edge_fade_ms, .. } => {
                let gap = self.gap_samples(sample_rate);
                concat_with_pauses(chunks, gap, millis_to_samples(edge_fade_ms, sample_rate))
            }
            Self::Crossfade { fade_ms } => {
                concat_with_crossfade(chunks, millis_to_samples(fade_ms, sample_rate).max(1))
            }
        }
    }
}

fn concat_with_pauses(chunks: Vec<Vec<f32>>, gap: usize, fade: usize) -> Vec<f32> {
    let total: usize = chunks.iter().map(Vec::len).sum::<usize>() + gap * (chunks.len() - 1);
    let mut out = Vec::with_capacity(total);
    let count = chunks.len();
    for (index, mut chunk) in chunks.into_iter().enumerate() {
        apply_edge_fades(&mut chunk, fade);
        out.extend_from_slice(&chunk);
        if index + 1 != count {
            out.resize(out.len() + gap, 0.0);
        }
    }
    out
}

/// Linear ramps of `min(fade, len / 8)` samples at both ends; chunks of eight
/// samples or fewer are left alone.
fn apply_edge_fades(chunk: &mut [f32], fade: usize) {
    let len = chunk.len();
    if fade == 0 || len <= 8 {
        return;
    }
    let ramp_len = fade.min(len / 8);
    if ramp_len == 0 {
        return;
    }
    for i in 0..ramp_len {
        let gain = if ramp_len == 1 {
            0.0
        } else {
            i as f32 / (ramp_len - 1) as f32
        };
        chunk[i] *= gain;
        chunk[len - 1 - i] *= gain;
    }
}

fn concat_with_crossfade(chunks: Vec<Vec<f32>>, fade: usize) -> Vec<f32> {
    let mut chunks = chunks.into_iter();
    let mut out = chunks.next().unwrap_or_default();
    for next in chunks {
        let overlap = fade.min(out.len()).min(next.len());
        let start = out.len() - overlap;
        for i in 0..overlap {
            let t = if overlap == 1 {
                1.0
            } else {
                i as f32 / (overlap - 1) as f32
            };
            out[start + i] = out[start + i] * (1.0 - t) + next[i] * t;
        }
        out.extend_from_slice(&next[overlap..]);
    }
    out
}
