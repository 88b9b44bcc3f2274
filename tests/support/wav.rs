use std::path::Path;

/// Write mono 16-bit PCM at `sample_rate`.
pub fn write_test_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Voiced-sounding test signal: a few harmonics under a slow amplitude envelope.
pub fn speech_like(seconds: f32, sample_rate: u32, pitch_hz: f32) -> Vec<f32> {
    let len = (seconds * sample_rate as f32) as usize;
    let sr = sample_rate as f32;
    (0..len)
        .map(|i| {
            let t = i as f32 / sr;
            let envelope = 0.6 + 0.4 * (2.0 * std::f32::consts::PI * 3.0 * t).sin();
            let tone: f32 = (1..=4)
                .map(|h| {
                    (2.0 * std::f32::consts::PI * pitch_hz * h as f32 * t).sin() / h as f32
                })
                .sum();
            0.2 * envelope * tone
        })
        .collect()
}
