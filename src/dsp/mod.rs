//! DSP building blocks: per-effect processors and the ramp envelope.
//!
//! Every processor works on stereo `f32` frames and is deterministic, so the
//! realtime preview and the offline export run the exact same code.

pub mod chorus;
pub mod compressor;
pub mod delay;
pub mod distortion;
pub mod envelope;
pub mod eq;
pub mod filter;
pub mod pan;
pub mod pitch;
pub mod resample;
