//! # Core Types
//!
//! Frame buffers and document geometry shared by every capture path.

pub mod frame;
pub mod geometry;

pub use frame::{RgbaFrame, Size};
pub use geometry::{BoundingBox, Point, Quadrilateral};
