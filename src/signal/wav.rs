use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::decode::{MonoAudio, downmix_to_mono};

/// Write mono samples as 16-bit PCM, clipping to `[-1, 1]`.
pub fn write_wav_pcm16(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), String> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: sample_rate.max(1),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|err| format!("Failed to create {}: {err}", path.display()))?;
    for &sample in samples {
        let value = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
        writer
            .write_sample((value * i16::MAX as f32).round() as i16)
            .map_err(|err| format!("Failed to write {}: {err}", path.display()))?;
    }
    writer
        .finalize()
        .map_err(|err| format!("Failed to finalize {}: {err}", path.display()))
}

/// Parse an in-memory WAV file (any PCM or float layout) into mono samples.
pub fn read_wav_bytes(bytes: &[u8]) -> Result<MonoAudio, String> {
    let reader =
        WavReader::new(Cursor::new(bytes)).map_err(|err| format!("Invalid WAV payload: {err}"))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|err| format!("Invalid WAV samples: {err}"))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|err| format!("Invalid WAV samples: {err}"))?
        }
    };
    let mut samples = Vec::new();
    downmix_to_mono(&mut samples, &interleaved, spec.channels);
    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate.max(1),
    })
}
