//! # Processing Module
//!
//! Turns detection results into pixels for the host: the quadrilateral
//! overlay, the stitch preview, and the [`Surface`] the host implements to
//! show them.

pub mod overlay;
pub mod preview;
pub mod surface;

pub use overlay::{BoxColor, OverlayCanvas, OverlayRenderer, OverlayShape};
pub use preview::PreviewScaler;
pub use surface::{NullSurface, Surface};
