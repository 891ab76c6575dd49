//! Audio capture and clip assembly
//!
//! A [`CaptureSource`] produces raw mono PCM; the [`CaptureLoop`] slices it
//! into fixed-duration [`ClipBuffer`]s with monotonic sequence numbers.

mod capture;
mod capture_loop;
mod clip;
mod sim;

pub use capture::{CaptureSource, MicSource, samples_to_wav, wav_to_samples};
pub use capture_loop::CaptureLoop;
pub use clip::ClipBuffer;
pub use sim::SimSource;
