use std::f64::consts::PI;

/// RBJ peaking equalizer section, run in direct form I.
#[derive(Debug, Clone, Copy)]
pub struct PeakingEq {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl PeakingEq {
    /// Returns `None` when the center frequency is not below Nyquist or `q` is not positive.
    pub fn new(sample_rate: u32, center_hz: f32, gain_db: f32, q: f32) -> Option<Self> {
        let sr = sample_rate as f64;
        let f0 = center_hz as f64;
        let q = q as f64;
        if sr <= 0.0 || f0 <= 0.0 || f0 >= sr * 0.5 || q <= 0.0 || !gain_db.is_finite() {
            return None;
        }
        let a = 10.0_f64.powf(gain_db as f64 / 40.0);
        let w0 = 2.0 * PI * f0 / sr;
        let alpha = w0.sin() / (2.0 * q);
        let cos_w0 = w0.cos();
        let a0 = 1.0 + alpha / a;
        Some(Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        })
    }

    pub fn process_in_place(&self, samples: &mut [f32]) {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
        for sample in samples.iter_mut() {
            let x0 = *sample as f64;
            let y0 = self.b0 * x0 + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
            *sample = y0 as f32;
        }
    }

    /// Magnitude response in dB at `freq_hz`.
    pub fn gain_db_at(&self, sample_rate: u32, freq_hz: f32) -> f32 {
        let w = 2.0 * PI * freq_hz as f64 / sample_rate.max(1) as f64;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = self.b1 * s1 + self.b2 * s2;
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = self.a1 * s1 + self.a2 * s2;
        let mag = ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt();
        (20.0 * mag.max(1e-12).log10()) as f32
    }
}
