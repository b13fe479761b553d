//! Host-side display collaborator.

use crate::core::{RgbaFrame, Size};
use crate::processing::overlay::OverlayCanvas;

/// Where the coordinator puts pixels. Layout and styling are the host's concern.
pub trait Surface: Send {
    /// Show the overlay canvas on top of the live video.
    fn present_overlay(&mut self, canvas: &OverlayCanvas);

    /// Show the incremental stitch preview.
    fn present_preview(&mut self, _preview: &RgbaFrame) {}

    /// Size of the preview container, if the host has one.
    fn preview_size(&self) -> Option<Size> {
        None
    }

    /// Show the final captured image.
    fn present_capture(&mut self, _image: &RgbaFrame) {}

    /// Drop every element the surface created.
    fn release(&mut self) {}
}

/// Surface for headless use; discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn present_overlay(&mut self, _canvas: &OverlayCanvas) {}
}
