use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Symmetric Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos()) as f32)
        .collect()
}

/// Short-time power spectrum folded into triangular mel bands.
pub struct MelSpectrogram {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    filters: Vec<Vec<(usize, f32)>>,
    fft: Arc<dyn Fft<f32>>,
}

impl MelSpectrogram {
    pub fn new(sample_rate: u32, n_fft: usize, hop: usize, n_mels: usize) -> Result<Self, String> {
        if sample_rate == 0 || n_fft < 2 || hop == 0 || n_mels == 0 {
            return Err(format!(
                "Invalid mel parameters: sr={sample_rate} n_fft={n_fft} hop={hop} n_mels={n_mels}"
            ));
        }
        let fft = FftPlanner::new().plan_fft_forward(n_fft);
        let bins = mel_bins(sample_rate, n_fft, n_mels);
        Ok(Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            filters: build_filters(&bins, n_mels, n_fft / 2),
            fft,
        })
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Mel power per frame, shape `(frames, n_mels)`.
    ///
    /// Frames start every `hop` samples while the start is inside the signal; the
    /// last frames are zero-padded. Empty input yields one all-zero frame.
    pub fn power(&self, samples: &[f32]) -> Array2<f32> {
        let frames = if samples.is_empty() {
            1
        } else {
            (samples.len() - 1) / self.hop + 1
        };
        let mut out = Array2::<f32>::zeros((frames, self.n_mels()));
        if samples.is_empty() {
            return out;
        }
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0_f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut power = vec![0.0_f32; self.n_fft / 2 + 1];
        for frame in 0..frames {
            let start = frame * self.hop;
            for (i, cell) in buffer.iter_mut().enumerate() {
                let sample = samples.get(start + i).copied().unwrap_or(0.0);
                let sample = if sample.is_finite() { sample } else { 0.0 };
                *cell = Complex::new(sample * self.window[i], 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            for (bin, slot) in power.iter_mut().enumerate() {
                *slot = buffer[bin].norm_sqr();
            }
            for (band, filter) in self.filters.iter().enumerate() {
                let energy: f64 = filter
                    .iter()
                    .map(|&(bin, weight)| power[bin] as f64 * weight as f64)
                    .sum();
                out[[frame, band]] = energy as f32;
            }
        }
        out
    }
}

fn mel_bins(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<usize> {
    let nyquist = sample_rate as f32 * 0.5;
    let mel_max = hz_to_mel(nyquist);
    (0..n_mels + 2)
        .map(|i| {
            let hz = mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32);
            freq_to_bin(hz, sample_rate, n_fft)
        })
        .collect()
}

fn build_filters(bins: &[usize], n_mels: usize, max_bin: usize) -> Vec<Vec<(usize, f32)>> {
    (0..n_mels)
        .map(|m| {
            let left = bins[m];
            let center = bins[m + 1].max(left);
            let right = bins[m + 2].max(center + 1);
            let mut filter = triangle(left, center, right);
            filter.retain(|&(bin, _)| bin <= max_bin);
            filter
        })
        .collect()
}

fn triangle(left: usize, center: usize, right: usize) -> Vec<(usize, f32)> {
    (left..=right)
        .filter_map(|bin| {
            let weight = if bin < center {
                (bin - left) as f32 / (center - left) as f32
            } else {
                (right - bin) as f32 / (right - center) as f32
            };
            (weight > 0.0).then_some((bin, weight))
        })
        .collect()
}

fn freq_to_bin(freq_hz: f32, sample_rate: u32, n_fft: usize) -> usize {
    let freq = freq_hz.clamp(0.0, sample_rate as f32 * 0.5);
    ((freq * n_fft as f32 / sample_rate as f32).floor() as usize).min(n_fft / 2)
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}
