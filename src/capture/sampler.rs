//! Per-tick frame sampling.
//!
//! Every sample keeps the full-resolution frame as the capture candidate and
//! derives the copy sent for detection, downscaled so its longer side is at
//! most the cap. The scale factor maps detection coordinates back.

use fast_image_resize::Resizer;
use lens_scale::cpu::resize_rgba;
use lens_scale::presets::{AspectMode, ScaleTarget, build_plan};
use log::trace;

use crate::capture::camera::Camera;
use crate::core::RgbaFrame;
use crate::error::LensResult;

#[derive(Clone, Debug)]
pub struct SampledFrame {
    /// Full-resolution snapshot, the candidate for the final capture.
    pub full: RgbaFrame,
    /// Copy sent for detection.
    pub detection: RgbaFrame,
    /// `detection` size over `full` size along the longer side; `1.0` when not downscaled.
    pub scale_factor: f64,
}

pub struct FrameSampler {
    resizer: Resizer,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSampler {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Derive the detection copy of `full`. With no cap the frame is shared as is.
    pub fn downscale(&mut self, full: RgbaFrame, cap: Option<u32>) -> LensResult<SampledFrame> {
        let Some(cap) = cap else {
            return Ok(SampledFrame {
                detection: full.clone(),
                full,
                scale_factor: 1.0,
            });
        };
        let plan = build_plan(full.size(), ScaleTarget::MaxLongSide(cap), AspectMode::Preserve);
        if plan.is_identity() {
            return Ok(SampledFrame {
                detection: full.clone(),
                full,
                scale_factor: 1.0,
            });
        }
        let data = resize_rgba(&mut self.resizer, &full.data, full.size(), &plan)?;
        let detection = RgbaFrame::new(plan.out.w, plan.out.h, data)?;
        trace!(
            "downscaled {}x{} -> {}x{} (factor {})",
            full.width, full.height, plan.out.w, plan.out.h, plan.factor
        );
        Ok(SampledFrame {
            full,
            detection,
            scale_factor: plan.factor,
        })
    }

    /// Grab the camera's current frame and sample it.
    pub async fn sample(&mut self, camera: &mut dyn Camera, cap: Option<u32>) -> LensResult<SampledFrame> {
        let full = camera.grab_frame().await?;
        self.downscale(full, cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Size;

    #[test]
    fn landscape_frame_is_capped() {
        let full = RgbaFrame::solid(2000, 1000, [1, 2, 3, 255]);
        let sample = FrameSampler::new().downscale(full.clone(), Some(512)).unwrap();
        assert_eq!(sample.detection.size(), Size { w: 512, h: 256 });
        assert!((sample.scale_factor - 0.256).abs() < 1e-12);
        assert_eq!(sample.full, full);
    }

    #[test]
    fn small_frame_is_shared() {
        let full = RgbaFrame::solid(320, 240, [1, 2, 3, 255]);
        let sample = FrameSampler::new().downscale(full.clone(), Some(512)).unwrap();
        assert_eq!(sample.scale_factor, 1.0);
        assert_eq!(sample.detection, full);
    }

    #[test]
    fn no_cap_keeps_full_resolution() {
        let full = RgbaFrame::solid(1400, 900, [0, 0, 0, 255]);
        let sample = FrameSampler::new().downscale(full, None).unwrap();
        assert_eq!(sample.detection.size(), Size { w: 1400, h: 900 });
    }
}
