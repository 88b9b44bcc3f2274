use tracing::debug;

use super::biquad::PeakingEq;
use crate::config::TimbreSettings;

const TREBLE_HZ: f32 = 4_000.0;
const TREBLE_Q: f32 = 0.8;
const PRESENCE_HZ: f32 = 2_500.0;
const PRESENCE_Q: f32 = 0.9;
const BODY_HZ: f32 = 180.0;
const BODY_Q: f32 = 0.7;
const SATURATION_DRIVE: f32 = 1.1;

/// Darken the voice: cut treble and presence, lift the body, then soft-clip.
///
/// Cuts are always applied as cuts and the boost as a boost, whatever the sign in
/// `settings`. Bands at or above Nyquist are skipped.
pub fn apply_timbre(samples: &mut [f32], sample_rate: u32, settings: &TimbreSettings) {
    let bands = [
        (TREBLE_HZ, -settings.treble_cut_db.abs(), TREBLE_Q),
        (PRESENCE_HZ, -settings.presence_cut_db.abs(), PRESENCE_Q),
        (BODY_HZ, settings.body_boost_db.abs(), BODY_Q),
    ];
    for (center_hz, gain_db, q) in bands {
        match PeakingEq::new(sample_rate, center_hz, gain_db, q) {
            Some(eq) => eq.process_in_place(samples),
            None => debug!("Skipping {center_hz} Hz band at {sample_rate} Hz"),
        }
    }
    for sample in samples.iter_mut() {
        *sample = (SATURATION_DRIVE * *sample).tanh();
    }
}
