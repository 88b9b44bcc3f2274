use crate::config::ReferenceVoiceSettings;
use crate::signal::{
    MonoAudio, db_to_linear, match_rms_in_place, millis_to_samples, peak_abs, resample_linear,
    seconds_to_samples,
};

const FRAME_RMS_EPS: f64 = 1e-8;
const NORMALIZE_EPS: f32 = 1e-8;

/// Bounds applied to the cleaned reference signal before segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationWindow {
    pub min_seconds: f32,
    pub max_seconds: f32,
}

impl DurationWindow {
    pub fn new(min_seconds: f32, max_seconds: f32) -> Self {
        let min_seconds = min_seconds.max(0.0);
        Self {
            min_seconds,
            max_seconds: max_seconds.max(min_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessParams {
    pub trim_top_db: f32,
    pub vad_frame_ms: f32,
    pub vad_median_ratio: f32,
    pub target_rms: f32,
    pub window: DurationWindow,
}

impl PreprocessParams {
    pub fn from_settings(settings: &ReferenceVoiceSettings) -> Self {
        Self {
            trim_top_db: settings.trim_top_db,
            vad_frame_ms: settings.vad_frame_ms,
            vad_median_ratio: settings.vad_median_ratio,
            target_rms: settings.target_rms,
            window: DurationWindow::new(settings.min_ref_seconds, settings.max_ref_seconds),
        }
    }
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self::from_settings(&ReferenceVoiceSettings::default())
    }
}

/// Cleans reference recordings into level-matched speech at the encoder rate.
#[derive(Debug, Clone, Copy)]
pub struct AudioPreprocessor {
    params: PreprocessParams,
    target_rate: u32,
}

impl AudioPreprocessor {
    pub fn new(params: PreprocessParams, target_rate: u32) -> Self {
        Self {
            params,
            target_rate: target_rate.max(1),
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Resample, trim, gate, normalize and fit to the duration window.
    ///
    /// Never fails; empty input yields empty output.
    pub fn process(&self, audio: &MonoAudio) -> Vec<f32> {
        if audio.samples.is_empty() {
            return Vec::new();
        }
        let resampled = resample_linear(&audio.samples, audio.sample_rate, self.target_rate);
        let trimmed = trim_silence(&resampled, self.params.trim_top_db);
        let frame_len = millis_to_samples(self.params.vad_frame_ms, self.target_rate);
        let mut gated = energy_gate(trimmed, frame_len, self.params.vad_median_ratio);
        match_rms_in_place(&mut gated, self.params.target_rms, NORMALIZE_EPS);
        let window = self.params.window;
        fit_duration(
            gated,
            seconds_to_samples(window.min_seconds, self.target_rate),
            seconds_to_samples(window.max_seconds, self.target_rate),
        )
    }
}

/// Drop leading and trailing samples quieter than `top_db` below the peak.
///
/// All-silent input is returned whole.
pub fn trim_silence(samples: &[f32], top_db: f32) -> &[f32] {
    let peak = peak_abs(samples);
    if peak <= 0.0 || !peak.is_finite() {
        return samples;
    }
    let threshold = peak * db_to_linear(-top_db.abs());
    let loud = |v: &f32| v.abs() > threshold;
    match (
        samples.iter().position(loud),
        samples.iter().rposition(loud),
    ) {
        (Some(start), Some(end)) => &samples[start..=end],
        _ => samples,
    }
}

/// Keep complete frames whose RMS exceeds `ratio` times the median frame RMS.
///
/// A trailing partial frame is dropped. Returns the input when it holds no
/// complete frame or no frame passes.
pub fn energy_gate(samples: &[f32], frame_len: usize, ratio: f32) -> Vec<f32> {
    if frame_len == 0 || samples.len() < frame_len {
        return samples.to_vec();
    }
    let levels: Vec<f32> = samples
        .chunks_exact(frame_len)
        .map(|frame| {
            let power: f64 =
                frame.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>() / frame_len as f64;
            (power + FRAME_RMS_EPS).sqrt() as f32
        })
        .collect();
    let mut sorted = levels.clone();
    sorted.sort_by(f32::total_cmp);
    let threshold = sorted[(sorted.len() - 1) / 2] * ratio;

    let kept: Vec<f32> = samples
        .chunks_exact(frame_len)
        .zip(&levels)
        .filter(|(_, level)| **level > threshold)
        .flat_map(|(frame, _)| frame.iter().copied())
        .collect();
    if kept.is_empty() {
        samples.to_vec()
    } else {
        kept
    }
}

/// Loop short signals whole until they reach `min_len`, then cap at `max_len`.
pub fn fit_duration(mut samples: Vec<f32>, min_len: usize, max_len: usize) -> Vec<f32> {
    let len = samples.len();
    if len == 0 {
        return samples;
    }
    if len < min_len {
        let repeats = min_len.div_ceil(len);
        samples = samples.repeat(repeats);
    }
    samples.truncate(max_len.max(1));
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::rms;

    #[test]
    fn trim_drops_quiet_edges_only() {
        let mut samples = vec![0.0001_f32; 100];
        samples.extend(vec![0.5_f32; 50]);
        samples.extend(vec![0.0_f32; 30]);
        let trimmed = trim_silence(&samples, 32.0);
        assert_eq!(trimmed.len(), 50);
        assert_eq!(trim_silence(&[0.0; 8], 32.0).len(), 8);
    }

    #[test]
    fn gate_removes_quiet_frames() {
        let mut samples = vec![0.5_f32; 30];
        samples.extend(vec![0.001_f32; 10]);
        samples.extend(vec![0.4_f32; 20]);
        samples.extend(vec![0.3_f32; 3]);
        let gated = energy_gate(&samples, 10, 0.8);
        assert_eq!(gated.len(), 50);
        assert!(gated.iter().all(|v| *v >= 0.4));
    }

    #[test]
    fn gate_keeps_input_when_nothing_passes() {
        let flat = vec![0.2_f32; 40];
        assert_eq!(energy_gate(&flat, 10, 1.5), flat);
        assert_eq!(energy_gate(&flat[..5], 10, 0.8).len(), 5);
    }

    #[test]
    fn short_signal_is_looped_then_capped() {
        let looped = fit_duration(vec![1.0, 2.0, 3.0], 7, 100);
        assert_eq!(looped, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(fit_duration(vec![0.1; 50], 5, 20).len(), 20);
        assert!(fit_duration(Vec::new(), 5, 20).is_empty());
    }

    #[test]
    fn process_normalizes_and_respects_window() {
        let audio = MonoAudio {
            samples: (0..8_000).map(|i| (i as f32 * 0.05).sin() * 0.2).collect(),
            sample_rate: 8_000,
        };
        let preprocessor = AudioPreprocessor::new(PreprocessParams::default(), 16_000);
        let out = preprocessor.process(&audio);
        assert!(out.len() >= 5 * 16_000);
        assert!(out.len() <= 20 * 16_000);
        assert!((rms(&out) - 0.05).abs() < 5e-3);
    }

    #[test]
    fn empty_audio_stays_empty() {
        let preprocessor = AudioPreprocessor::new(PreprocessParams::default(), 16_000);
        let out = preprocessor.process(&MonoAudio {
            samples: Vec::new(),
            sample_rate: 16_000,
        });
        assert!(out.is_empty());
    }
}
