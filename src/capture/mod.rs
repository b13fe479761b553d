// # Capture Module
//
// Camera access and per-tick frame sampling.

pub mod camera;
pub mod sampler;

pub use camera::{Camera, CameraConstraints, FacingMode};
pub use sampler::{FrameSampler, SampledFrame};
