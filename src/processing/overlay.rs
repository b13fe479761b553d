//! # Quadrilateral Overlay
//!
//! A transparent RGBA canvas the size of the live video with the current
//! document boundary filled in a translucent colour. Drawing always resizes
//! the canvas to the video first, clears it, and then fills the path; an
//! empty quadrilateral only clears.
//!
//! ```rust
//! use doc_lens::core::{Point, Quadrilateral, Size};
//! use doc_lens::processing::{BoxColor, OverlayRenderer, OverlayShape};
//!
//! let mut renderer = OverlayRenderer::new(BoxColor::default(), OverlayShape::Contour);
//! let quad = Quadrilateral::new([
//!     Point::new(2.0, 2.0),
//!     Point::new(8.0, 2.0),
//!     Point::new(8.0, 8.0),
//!     Point::new(2.0, 8.0),
//! ]);
//! let video = Size { w: 10, h: 10 };
//! assert!(!renderer.draw(&quad, video).is_transparent());
//! assert!(renderer.draw(&Quadrilateral::empty(), video).is_transparent());
//! ```

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use serde::Deserialize;

use crate::core::{Point, Quadrilateral, RgbaFrame, Size};

/// Overlay fill colour, straight (non-premultiplied) RGBA.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for BoxColor {
    /// `rgba(84, 192, 139, 0.6)`
    fn default() -> Self {
        Self {
            r: 84,
            g: 192,
            b: 139,
            a: 153,
        }
    }
}

impl BoxColor {
    /// Parse a CSS colour: `rgba(r, g, b, a)`, `rgb(r, g, b)`, `#rrggbb` or `#rrggbbaa`.
    pub fn parse(css: &str) -> Option<Self> {
        let css = css.trim();
        if let Some(hex) = css.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        let (args, with_alpha) = if let Some(rest) = css.strip_prefix("rgba(") {
            (rest.strip_suffix(')')?, true)
        } else if let Some(rest) = css.strip_prefix("rgb(") {
            (rest.strip_suffix(')')?, false)
        } else {
            return None;
        };

        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let channel = |s: &str| s.parse::<u8>().ok();
        match (parts.as_slice(), with_alpha) {
            ([r, g, b], false) => Some(Self {
                r: channel(r)?,
                g: channel(g)?,
                b: channel(b)?,
                a: 255,
            }),
            ([r, g, b, a], true) => {
                let alpha = a.parse::<f32>().ok().filter(|a| (0.0..=1.0).contains(a))?;
                Some(Self {
                    r: channel(r)?,
                    g: channel(g)?,
                    b: channel(b)?,
                    a: (alpha * 255.0).round() as u8,
                })
            }
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: if hex.len() == 8 { byte(6)? } else { 255 },
        })
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// CSS form, as accepted by [`BoxColor::parse`].
    pub fn to_css(self) -> String {
        let alpha = (self.a as f32 / 255.0 * 100.0).round() / 100.0;
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
    }
}

/// Geometry drawn for a detected quadrilateral.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayShape {
    /// Fill the detected contour as is.
    Contour,
    /// Grow the bounding box by `margin` of its size and fill that rectangle.
    ExpandedRect { margin: f64 },
}

/// Transparent RGBA drawing surface.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayCanvas {
    image: RgbaImage,
}

impl OverlayCanvas {
    pub fn new(size: Size) -> Self {
        Self {
            image: RgbaImage::new(size.w, size.h),
        }
    }

    pub fn size(&self) -> Size {
        Size {
            w: self.image.width(),
            h: self.image.height(),
        }
    }

    /// Resize to `size`, dropping the content. No-op when the size is unchanged.
    pub fn resize(&mut self, size: Size) {
        if self.size() != size {
            self.image = RgbaImage::new(size.w, size.h);
        }
    }

    pub fn clear(&mut self) {
        self.image.fill(0);
    }

    pub fn is_transparent(&self) -> bool {
        self.image.pixels().all(|px| px[3] == 0)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.image.get_pixel_checked(x, y).map(|px| px.0)
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Copy of the canvas as a frame, e.g. for compositing by the host.
    pub fn to_frame(&self) -> RgbaFrame {
        RgbaFrame {
            data: std::sync::Arc::new(self.image.as_raw().clone()),
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    /// Fill a closed polygon, boundary pixels included. Corners are rounded
    /// to the pixel grid; a path that collapses below three points draws nothing.
    fn fill_polygon(&mut self, path: &[Point; 4], rgba: [u8; 4]) {
        if self.image.width() == 0 || self.image.height() == 0 {
            return;
        }
        let mut poly: Vec<PixelPoint<i32>> = path
            .iter()
            .map(|p| PixelPoint::new(p.x.round() as i32, p.y.round() as i32))
            .collect();
        poly.dedup();
        // imageproc expects an open path.
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 {
            return;
        }
        draw_polygon_mut(&mut self.image, &poly, Rgba(rgba));
    }
}

/// Draws the current quadrilateral onto an [`OverlayCanvas`].
#[derive(Debug)]
pub struct OverlayRenderer {
    color: BoxColor,
    shape: OverlayShape,
    canvas: OverlayCanvas,
}

impl OverlayRenderer {
    pub fn new(color: BoxColor, shape: OverlayShape) -> Self {
        Self {
            color,
            shape,
            canvas: OverlayCanvas::new(Size { w: 0, h: 0 }),
        }
    }

    pub fn color(&self) -> BoxColor {
        self.color
    }

    pub fn set_color(&mut self, color: BoxColor) {
        self.color = color;
    }

    pub fn canvas(&self) -> &OverlayCanvas {
        &self.canvas
    }

    /// Resize to `video`, clear, and fill `quad` if it is not empty.
    pub fn draw(&mut self, quad: &Quadrilateral, video: Size) -> &OverlayCanvas {
        self.canvas.resize(video);
        self.canvas.clear();
        let path = match self.shape {
            OverlayShape::Contour => quad.clone(),
            OverlayShape::ExpandedRect { margin } => quad.expanded_rect(margin, video),
        };
        if let Some(corners) = path.corners() {
            self.canvas.fill_polygon(corners, self.color.to_rgba());
        }
        &self.canvas
    }

    pub fn erase(&mut self) -> &OverlayCanvas {
        self.canvas.clear();
        &self.canvas
    }

    /// Shrink the canvas to nothing.
    pub fn release(&mut self) {
        self.canvas = OverlayCanvas::new(Size { w: 0, h: 0 });
    }
}

/// One-shot rendering of `quad` on a fresh canvas.
pub fn render_overlay(quad: &Quadrilateral, color: BoxColor, shape: OverlayShape, video: Size) -> OverlayCanvas {
    let mut renderer = OverlayRenderer::new(color, shape);
    renderer.draw(quad, video);
    renderer.canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Quadrilateral {
        Quadrilateral::new([
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    #[test]
    fn parses_css_colours() {
        assert_eq!(BoxColor::parse("rgba(84, 192, 139, 0.6)"), Some(BoxColor::default()));
        assert_eq!(
            BoxColor::parse("rgb(1,2,3)"),
            Some(BoxColor { r: 1, g: 2, b: 3, a: 255 })
        );
        assert_eq!(
            BoxColor::parse("#ff000080"),
            Some(BoxColor { r: 255, g: 0, b: 0, a: 128 })
        );
        assert_eq!(BoxColor::parse("rgba(1, 2, 3, 1.5)"), None);
        assert_eq!(BoxColor::parse("red"), None);
        assert_eq!(BoxColor::parse("#12345"), None);
    }

    #[test]
    fn css_round_trip() {
        let c = BoxColor::default();
        assert_eq!(BoxColor::parse(&c.to_css()), Some(c));
    }

    #[test]
    fn fills_inside_only() {
        let canvas = render_overlay(
            &square(2.0, 2.0, 6.0, 6.0),
            BoxColor::default(),
            OverlayShape::Contour,
            Size { w: 10, h: 10 },
        );
        assert_eq!(canvas.pixel(3, 3), Some(BoxColor::default().to_rgba()));
        assert_eq!(canvas.pixel(5, 5), Some(BoxColor::default().to_rgba()));
        assert_eq!(canvas.pixel(6, 6), Some(BoxColor::default().to_rgba()));
        assert_eq!(canvas.pixel(7, 7), Some([0, 0, 0, 0]));
        assert_eq!(canvas.pixel(1, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn draw_then_clear_is_transparent() {
        let mut renderer = OverlayRenderer::new(BoxColor::default(), OverlayShape::Contour);
        let video = Size { w: 32, h: 24 };
        let quads = [
            square(0.0, 0.0, 32.0, 24.0),
            square(-10.0, -10.0, 50.0, 50.0),
            Quadrilateral::new([
                Point::new(3.0, 1.0),
                Point::new(28.0, 4.0),
                Point::new(4.0, 20.0),
                Point::new(30.0, 22.0),
            ]),
        ];
        for q in &quads {
            assert!(!renderer.draw(q, video).is_transparent());
            assert!(renderer.draw(&Quadrilateral::empty(), video).is_transparent());
        }
    }

    #[test]
    fn collapsed_path_draws_nothing() {
        let mut renderer = OverlayRenderer::new(BoxColor::default(), OverlayShape::Contour);
        let video = Size { w: 16, h: 16 };
        assert!(renderer.draw(&Quadrilateral::new([Point::new(4.2, 4.2); 4]), video).is_transparent());
        let sliver = Quadrilateral::new([
            Point::new(3.0, 3.0),
            Point::new(9.0, 3.0),
            Point::new(9.0, 3.0),
            Point::new(3.0, 3.0),
        ]);
        assert!(renderer.draw(&sliver, video).is_transparent());
    }

    #[test]
    fn canvas_follows_video_size() {
        let mut renderer = OverlayRenderer::new(BoxColor::default(), OverlayShape::Contour);
        renderer.draw(&square(1.0, 1.0, 4.0, 4.0), Size { w: 8, h: 8 });
        let canvas = renderer.draw(&square(1.0, 1.0, 4.0, 4.0), Size { w: 16, h: 4 });
        assert_eq!(canvas.size(), Size { w: 16, h: 4 });
    }

    #[test]
    fn expanded_rect_covers_more_than_contour() {
        let video = Size { w: 40, h: 40 };
        let quad = square(10.0, 10.0, 30.0, 30.0);
        let contour = render_overlay(&quad, BoxColor::default(), OverlayShape::Contour, video);
        let expanded = render_overlay(
            &quad,
            BoxColor::default(),
            OverlayShape::ExpandedRect { margin: 0.1 },
            video,
        );
        assert_eq!(contour.pixel(9, 9), Some([0, 0, 0, 0]));
        assert_eq!(expanded.pixel(9, 9), Some(BoxColor::default().to_rgba()));
    }
}
