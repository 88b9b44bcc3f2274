use super::spectrum::hann_window;
use crate::signal::resample_linear;

const MIN_SPEED: f64 = 0.5;
const MAX_SPEED: f64 = 2.0;
const SILENCE_ENERGY: f32 = 1e-6;
const SIMILARITY_THRESHOLD: f32 = 0.2;

/// Shift pitch by `semitones` while keeping the sample count.
///
/// Stretches time by the pitch ratio with WSOLA, then resamples back to the
/// original length. Shifts are limited to one octave either way.
pub fn shift_pitch(samples: &[f32], sample_rate: u32, semitones: f32) -> Vec<f32> {
    if samples.is_empty() || !semitones.is_finite() || semitones.abs() < 1e-6 {
        return samples.to_vec();
    }
    let ratio = 2.0_f64.powf(semitones.clamp(-12.0, 12.0) as f64 / 12.0);
    let stretched = Wsola::new(sample_rate).stretch(samples, 1.0 / ratio);
    if stretched.len() == samples.len() {
        return stretched;
    }
    let mut shifted = resample_linear(&stretched, stretched.len() as u32, samples.len() as u32);
    shifted.resize(samples.len(), 0.0);
    shifted
}

/// Waveform-similarity overlap-add time stretcher for mono speech.
pub struct Wsola {
    window_size: usize,
    hop: usize,
    search_radius: usize,
    window: Vec<f32>,
}

impl Wsola {
    /// 25 ms Hann windows with 50 % overlap.
    pub fn new(sample_rate: u32) -> Self {
        let mut window_size = ((sample_rate.max(1) as f32) * 0.025).round() as usize;
        window_size = window_size.clamp(128, 4096);
        if window_size % 2 != 0 {
            window_size += 1;
        }
        let hop = window_size / 2;
        Self {
            window_size,
            hop,
            search_radius: hop / 2,
            window: hann_window(window_size),
        }
    }

    /// Play `input` at `speed` without changing pitch; output length is `len / speed`.
    pub fn stretch(&self, input: &[f32], speed: f64) -> Vec<f32> {
        let speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        if input.len() < self.window_size * 2 || (speed - 1.0).abs() < 1e-3 {
            return input.to_vec();
        }
        let output_len = ((input.len() as f64) / speed).round().max(1.0) as usize;
        let mut output = vec![0.0_f32; output_len];
        for i in 0..self.window_size.min(output_len) {
            output[i] = input[i] * self.window[i];
        }

        let max_start = input.len() - self.window_size;
        let mut analysis_pos = self.hop as f64 * speed;
        let mut synthesis_pos = self.hop;
        while synthesis_pos + self.window_size <= output_len {
            let expected = (analysis_pos.round() as usize).min(max_start);
            let chosen = self.best_offset(input, &output[synthesis_pos - self.hop..synthesis_pos], expected, max_start);
            for i in 0..self.window_size {
                output[synthesis_pos + i] += input[chosen + i] * self.window[i];
            }
            analysis_pos += self.hop as f64 * speed;
            synthesis_pos += self.hop;
        }
        output
    }

    /// Candidate start near `expected` whose head best continues `tail`.
    fn best_offset(&self, input: &[f32], tail: &[f32], expected: usize, max_start: usize) -> usize {
        let tail_energy: f32 = tail.iter().map(|v| v * v).sum();
        if tail_energy <= SILENCE_ENERGY {
            return expected;
        }
        let lo = expected.saturating_sub(self.search_radius);
        let hi = (expected + self.search_radius).min(max_start);
        let mut best = (expected, f32::NEG_INFINITY);
        for candidate in lo..=hi {
            let head = &input[candidate..candidate + tail.len()];
            let (mut dot, mut energy) = (0.0_f32, 0.0_f32);
            for (a, b) in tail.iter().zip(head) {
                dot += a * b;
                energy += b * b;
            }
            if energy <= SILENCE_ENERGY {
                continue;
            }
            let score = dot / (tail_energy * energy).sqrt();
            if score > best.1 {
                best = (candidate, score);
            }
        }
        if best.1 < SIMILARITY_THRESHOLD {
            expected
        } else {
            best.0
        }
    }
}
