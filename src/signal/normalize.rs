/// Convert decibels to a linear amplitude ratio.
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Plain root-mean-square level; zero for empty input.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&v| (v as f64) * (v as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// RMS with `eps` added under the root, so silent buffers report `sqrt(eps)`.
pub fn rms_with_floor(samples: &[f32], eps: f32) -> f32 {
    if samples.is_empty() {
        return eps.max(0.0).sqrt();
    }
    let sum: f64 = samples.iter().map(|&v| (v as f64) * (v as f64)).sum();
    ((sum / samples.len() as f64) + eps as f64).sqrt() as f32
}

pub fn peak_abs(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |acc, v| acc.max(v.abs()))
}

/// Scale to `target_rms` and clip to `[-1, 1]`.
///
/// Buffers whose level is below `eps` are left untouched.
pub fn match_rms_in_place(samples: &mut [f32], target_rms: f32, eps: f32) {
    let level = rms_with_floor(samples, eps);
    if !level.is_finite() || level < eps || !target_rms.is_finite() || target_rms <= 0.0 {
        return;
    }
    let gain = target_rms / level.max(eps);
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}

pub fn sanitize_samples_in_place(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = sanitize_sample(*sample);
    }
}

pub(super) fn sanitize_sample(sample: f32) -> f32 {
    if !sample.is_finite() {
        return 0.0;
    }
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped != 0.0 && clamped.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        clamped
    }
}
