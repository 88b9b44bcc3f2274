//! Decoding, resampling and level helpers shared by the voice and emotion paths.

mod decode;
mod normalize;
mod resample;
mod wav;

pub use decode::{MonoAudio, decode_mono, downmix_to_mono};
pub use normalize::{
    db_to_linear, match_rms_in_place, peak_abs, rms, rms_with_floor, sanitize_samples_in_place,
};
pub use resample::{resample_linear, resample_linear_into};
pub use wav::{read_wav_bytes, write_wav_pcm16};

/// Number of samples covering `millis` at `sample_rate`, truncated like an integer cast.
pub fn millis_to_samples(millis: f32, sample_rate: u32) -> usize {
    if !millis.is_finite() || millis <= 0.0 {
        return 0;
    }
    (sample_rate as f64 * millis as f64 / 1000.0) as usize
}

/// Number of samples covering `seconds` at `sample_rate`, truncated like an integer cast.
pub fn seconds_to_samples(seconds: f32, sample_rate: u32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds as f64 * sample_rate as f64) as usize
}
