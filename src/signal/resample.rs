/// Linear-interpolation resampler; returns the input unchanged when rates match.
pub fn resample_linear(samples: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    let mut out = Vec::new();
    resample_linear_into(&mut out, samples, input_rate, output_rate);
    out
}

pub fn resample_linear_into(
    out: &mut Vec<f32>,
    samples: &[f32],
    input_rate: u32,
    output_rate: u32,
) {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    out.clear();
    if samples.is_empty() || input_rate == output_rate {
        out.extend_from_slice(samples);
        return;
    }
    let duration_seconds = samples.len() as f64 / input_rate as f64;
    let out_len = (duration_seconds * output_rate as f64).round().max(1.0) as usize;
    out.reserve(out_len);
    let step = input_rate as f64 / output_rate as f64;
    for i in 0..out_len {
        out.push(lerp_sample(samples, i as f64 * step));
    }
}

fn lerp_sample(samples: &[f32], pos: f64) -> f32 {
    let idx0 = pos.floor().max(0.0) as usize;
    let last = samples.len().saturating_sub(1);
    if idx0 >= last {
        return samples.get(last).copied().unwrap_or(0.0);
    }
    let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
    let a = samples[idx0];
    let b = samples[idx0 + 1];
    a + (b - a) * frac
}
