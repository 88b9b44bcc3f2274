//! Signal processing shared by the speaker encoders, the emotion model and synthesis
//! post-processing.

mod biquad;
mod pitch;
mod spectrum;
mod timbre;

pub use biquad::PeakingEq;
pub use pitch::{Wsola, shift_pitch};
pub use spectrum::{MelSpectrogram, hann_window};
pub use timbre::apply_timbre;
