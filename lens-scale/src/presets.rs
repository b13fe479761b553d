// SPDX-License-Identifier: MIT
//! # Scale Plan Computation
//!
//! A [`ScalePlan`] answers two questions for a frame: what size should the
//! detection copy be, and by which factor must coordinates found on that copy
//! be divided to land back in display space.
//!
//! - **ScaleTarget**: the size constraint (cap on the longest side, or an exact box)
//! - **AspectMode**: whether the aspect ratio is kept or the image is stretched
//!
//! Frames already within the cap are never upscaled; their factor is `1.0`.

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    /// Length of the longer side.
    pub fn long_side(&self) -> u32 {
        self.w.max(self.h)
    }

    /// Number of bytes of a tightly packed RGBA buffer of this size.
    pub fn rgba_len(&self) -> usize {
        (self.w as usize) * (self.h as usize) * 4
    }
}

/// Defines how aspect ratio differences are handled during scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectMode {
    /// Keep original aspect ratio; output fits entirely within target bounds.
    Preserve,
    /// Stretch/squeeze image to exactly match target dimensions.
    Distort,
}

/// Defines the target size constraint for scaling operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Clamp the longest side to a maximum value, derive the other side proportionally.
    MaxLongSide(u32),
    /// Force output into exact dimensions (preview surfaces).
    Exact(Size),
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Target size constraint used for planning
    pub target: ScaleTarget,
    /// Aspect ratio handling strategy
    pub aspect: AspectMode,
    /// Final computed output dimensions
    pub out: Size,
    /// Ratio output/input along the longest side. Detected coordinates are
    /// divided by this factor to map them back onto the input frame.
    pub factor: f64,
}

impl ScalePlan {
    /// True when the plan leaves the frame untouched.
    pub fn is_identity(&self) -> bool {
        self.out == self.input
    }
}

/// Compute a complete scaling plan from input parameters.
///
/// # Arguments
/// * `input` - Source image dimensions
/// * `target` - Size constraint to apply
/// * `aspect` - How to handle aspect ratio differences
pub fn build_plan(input: Size, target: ScaleTarget, aspect: AspectMode) -> ScalePlan {
    match (target, aspect) {
        (ScaleTarget::MaxLongSide(max_side), AspectMode::Preserve) => {
            let (w, h, factor) = fit_preserve(input, max_side);
            ScalePlan {
                input,
                target,
                aspect,
                out: Size { w, h },
                factor,
            }
        }
        (ScaleTarget::MaxLongSide(max_side), AspectMode::Distort) => {
            let out = Size {
                w: max_side.max(1),
                h: max_side.max(1),
            };
            ScalePlan {
                input,
                target,
                aspect,
                out,
                factor: max_side as f64 / input.long_side().max(1) as f64,
            }
        }
        (ScaleTarget::Exact(out), AspectMode::Distort) => ScalePlan {
            input,
            target,
            aspect,
            out,
            factor: out.w as f64 / input.w.max(1) as f64,
        },
        (ScaleTarget::Exact(out), AspectMode::Preserve) => {
            let (w, h, factor) = fit_within(input, out);
            ScalePlan {
                input,
                target,
                aspect,
                out: Size { w, h },
                factor,
            }
        }
    }
}

/// Fit image within max_long constraint while preserving aspect ratio.
///
/// The factor is exactly `max_long / long_side` so that a 2000×1000 frame with
/// a cap of 512 yields 0.256, independent of output rounding.
fn fit_preserve(input: Size, max_long: u32) -> (u32, u32, f64) {
    let (w, h) = (input.w as f64, input.h as f64);
    let long = w.max(h).max(1.0);
    let s = (max_long as f64 / long).min(1.0); // don't upscale
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
        s,
    )
}

/// Fit image within a bounding box while preserving aspect ratio.
fn fit_within(input: Size, box_: Size) -> (u32, u32, f64) {
    let (w, h) = (input.w.max(1) as f64, input.h.max(1) as f64);
    let (bw, bh) = (box_.w as f64, box_.h as f64);
    let s = (bw / w).min(bh / h).min(1.0);
    (
        ((w * s).round() as u32).max(1),
        ((h * s).round() as u32).max(1),
        s,
    )
}
