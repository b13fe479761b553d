//! Stitch preview resizing.
//!
//! The engine hands back a low-resolution panorama with every accumulated
//! frame; the host shows it stretched into its preview container.

use fast_image_resize::Resizer;
use lens_scale::cpu::resize_rgba;
use lens_scale::presets::{AspectMode, ScaleTarget, build_plan};

use crate::core::{RgbaFrame, Size};
use crate::error::LensResult;

pub struct PreviewScaler {
    resizer: Resizer,
}

impl Default for PreviewScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewScaler {
    pub fn new() -> Self {
        Self {
            resizer: Resizer::new(),
        }
    }

    /// Stretch `preview` to `target`. With no target the preview is returned as is.
    pub fn fit(&mut self, preview: &RgbaFrame, target: Option<Size>) -> LensResult<RgbaFrame> {
        let Some(target) = target.filter(|t| t.w > 0 && t.h > 0) else {
            return Ok(preview.clone());
        };
        let plan = build_plan(preview.size(), ScaleTarget::Exact(target), AspectMode::Distort);
        let data = resize_rgba(&mut self.resizer, &preview.data, preview.size(), &plan)?;
        RgbaFrame::new(plan.out.w, plan.out.h, data)
    }
}
