//! # Document Geometry
//!
//! A [`Quadrilateral`] is the best current estimate of a document boundary in
//! display-space pixels. It is either empty or holds exactly four corners in
//! the order the detector reported them (which is also the path order used
//! when the overlay is filled).

use serde::{Deserialize, Serialize};

use crate::core::frame::Size;
use crate::error::{LensError, LensResult};

/// A 2D point in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Four ordered corners bounding a detected document, or nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Quadrilateral {
    corners: Option<[Point; 4]>,
}

impl Quadrilateral {
    pub fn empty() -> Self {
        Self { corners: None }
    }

    pub fn new(corners: [Point; 4]) -> Self {
        Self {
            corners: Some(corners),
        }
    }

    /// Build from `[x, y]` pairs as they arrive on the wire. Zero pairs yields
    /// an empty quadrilateral; any count other than 0 or 4 is rejected.
    pub fn from_pairs(pairs: &[[f64; 2]]) -> LensResult<Self> {
        match pairs {
            [] => Ok(Self::empty()),
            [a, b, c, d] => Ok(Self::new([(*a).into(), (*b).into(), (*c).into(), (*d).into()])),
            _ => Err(LensError::validation(
                "quadrilateral",
                "exactly 4 corners",
                pairs.len().to_string(),
            )),
        }
    }

    /// First four points of a detector's corner list (one document), if present.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        match points {
            [a, b, c, d, ..] => Some(Self::new([*a, *b, *c, *d])),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_none()
    }

    pub fn corners(&self) -> Option<&[Point; 4]> {
        self.corners.as_ref()
    }

    /// Corners as `[x, y]` pairs; empty when no boundary is known.
    pub fn to_pairs(&self) -> Vec<[f64; 2]> {
        self.corners
            .map(|c| c.iter().map(|p| [p.x, p.y]).collect())
            .unwrap_or_default()
    }

    /// Multiply every coordinate by `factor`.
    pub fn rescaled(&self, factor: f64) -> Self {
        Self {
            corners: self
                .corners
                .map(|c| c.map(|p| Point::new(p.x * factor, p.y * factor))),
        }
    }

    /// Map coordinates found on a frame downscaled by `scale_factor` back to
    /// display space.
    pub fn to_display(&self, scale_factor: f64) -> Self {
        if scale_factor <= 0.0 || scale_factor == 1.0 {
            return self.clone();
        }
        self.rescaled(1.0 / scale_factor)
    }

    /// A detector reports "nothing" as four corners at the origin.
    pub fn is_degenerate(&self) -> bool {
        match &self.corners {
            None => true,
            Some(c) => c.iter().all(|p| p.x + p.y == 0.0),
        }
    }

    /// Axis-aligned bounds of the corners.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let c = self.corners.as_ref()?;
        let min_x = c.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = c.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = c.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = c.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        Some(BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Grow the bounding box by `margin_ratio` of its size on every side,
    /// clamp it to `bounds`, and return it as a rectangle path
    /// (top-left, top-right, bottom-right, bottom-left).
    pub fn expanded_rect(&self, margin_ratio: f64, bounds: Size) -> Self {
        let Some(bbox) = self.bounding_box() else {
            return Self::empty();
        };
        let dx = bbox.width * margin_ratio;
        let dy = bbox.height * margin_ratio;
        let x0 = (bbox.x - dx).max(0.0);
        let y0 = (bbox.y - dy).max(0.0);
        let x1 = (bbox.x + bbox.width + dx).min(bounds.w as f64);
        let y1 = (bbox.y + bbox.height + dy).min(bounds.h as f64);
        Self::new([
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }
}

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Corners in the order the engine's crop call expects:
    /// top-left, top-right, bottom-left, bottom-right.
    pub fn crop_corners(&self) -> [Point; 4] {
        let (x0, y0) = (self.x, self.y);
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x0, y1),
            Point::new(x1, y1),
        ]
    }

    /// Integer pixel rectangle `(x, y, w, h)` covering the box, clamped to `bounds`.
    pub fn to_pixel_rect(&self, bounds: Size) -> (u32, u32, u32, u32) {
        let x0 = self.x.max(0.0).floor().min(bounds.w as f64);
        let y0 = self.y.max(0.0).floor().min(bounds.h as f64);
        let x1 = (self.x + self.width).min(bounds.w as f64).ceil().max(x0);
        let y1 = (self.y + self.height).min(bounds.h as f64).ceil().max(y0);
        (x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)
    }

    /// Whether the box covers at least one pixel of a `bounds` sized frame.
    pub fn overlaps(&self, bounds: Size) -> bool {
        let (_, _, w, h) = self.to_pixel_rect(bounds);
        w > 0 && h > 0
    }
}
