use std::fs::File;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};

use super::normalize::sanitize_sample;

/// Decoded audio folded down to one channel, at its native sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode any supported container into mono `f32` samples.
pub fn decode_mono(path: &Path) -> Result<MonoAudio, String> {
    let (interleaved, sample_rate, channels) = decode_with_symphonia(path)
        .map_err(|err| format!("Audio decode failed for {}: {err}", path.display()))?;
    let mut samples = Vec::new();
    downmix_to_mono(&mut samples, &interleaved, channels);
    Ok(MonoAudio {
        samples,
        sample_rate: sample_rate.max(1),
    })
}

/// Average interleaved frames into `out`, zeroing non-finite samples.
pub fn downmix_to_mono(out: &mut Vec<f32>, samples: &[f32], channels: u16) {
    let channels = channels.max(1) as usize;
    out.clear();
    if channels == 1 {
        out.extend(samples.iter().copied().map(sanitize_sample));
        return;
    }
    let frames = samples.len() / channels;
    out.reserve(frames);
    for frame in samples.chunks_exact(channels) {
        let sum: f32 = frame.iter().copied().map(sanitize_sample).sum();
        out.push(sum / channels as f32);
    }
}

fn decode_with_symphonia(path: &Path) -> Result<(Vec<f32>, u32, u16), String> {
    let file = File::open(path).map_err(|err| format!("open: {err}"))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| format!("probe: {err}"))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| "no default track".to_string())?;
    let track_id = track.id;
    let codec_params = &track.codec_params;
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| "missing sample rate".to_string())?;
    let channels = codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(1);
    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .map_err(|err| format!("decoder: {err}"))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(err) => return Err(format!("packet read: {err}")),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(Error::DecodeError(_)) => continue,
            Err(err) => return Err(format!("decode: {err}")),
        };
        let spec = *audio_buf.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err("decoded 0 samples".to_string());
    }
    Ok((samples, sample_rate, channels.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::tempdir;

    #[test]
    fn downmix_averages_stereo_frames() {
        let mut out = Vec::new();
        downmix_to_mono(&mut out, &[1.0, 0.0, 0.5, 0.5, f32::NAN, 1.0], 2);
        assert_eq!(out, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn decodes_stereo_wav_to_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(i16::MAX / 2).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();

        let decoded = decode_mono(&path).unwrap();
        assert_eq!(decoded.sample_rate, 8_000);
        assert_eq!(decoded.samples.len(), 800);
        assert!((decoded.samples[10] - 0.25).abs() < 1e-2);
        assert!((decoded.duration_seconds() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn zero_byte_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();
        assert!(decode_mono(&path).is_err());
    }
}
