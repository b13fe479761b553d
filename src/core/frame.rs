//! # RGBA Frames
//!
//! The single in-memory image representation used between the camera, the
//! vision engine, the overlay and the final JPEG payload. Pixel data is shared
//! through an `Arc` so a frame can be retained as the full-resolution capture
//! candidate and handed to a detector at the same time without copying.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};

pub use lens_scale::presets::Size;

use crate::core::geometry::BoundingBox;
use crate::error::{LensError, LensResult};

/// Tightly packed RGBA8 image.
#[derive(Clone, Debug, PartialEq)]
pub struct RgbaFrame {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl RgbaFrame {
    /// Wrap a pixel buffer, checking that it matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> LensResult<Self> {
        let expected = Size { w: width, h: height }.rgba_len();
        if data.len() != expected {
            return Err(LensError::validation(
                "frame.data",
                format!("length must equal width * height * 4 = {}", expected),
                data.len().to_string(),
            ));
        }
        Ok(Self {
            data: Arc::new(data),
            width,
            height,
        })
    }

    /// A frame filled with one colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let len = Size { w: width, h: height }.rgba_len();
        let data = rgba.iter().copied().cycle().take(len).collect();
        Self {
            data: Arc::new(data),
            width,
            height,
        }
    }

    pub fn size(&self) -> Size {
        Size {
            w: self.width,
            h: self.height,
        }
    }

    /// Decode any format the `image` crate understands (uploads, test fixtures).
    pub fn from_encoded(bytes: &[u8]) -> LensResult<Self> {
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self {
            data: Arc::new(decoded.into_raw()),
            width,
            height,
        })
    }

    /// Decode a base64 encoded image, with or without a `data:` URL prefix.
    pub fn from_base64(payload: &str) -> LensResult<Self> {
        let raw = payload
            .split_once(";base64,")
            .map(|(_, b64)| b64)
            .unwrap_or(payload);
        let bytes = STANDARD.decode(raw.trim())?;
        Self::from_encoded(&bytes)
    }

    fn to_rgba_image(&self) -> LensResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.as_ref().clone())
            .ok_or_else(|| LensError::codec("rgba_image", "buffer does not match dimensions"))
    }

    /// Encode as JPEG. Alpha is dropped.
    pub fn to_jpeg(&self, quality: u8) -> LensResult<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.to_rgba_image()?).to_rgb8();
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
        Ok(out.into_inner())
    }

    /// JPEG payload as bare base64 (no `data:` prefix), the format every
    /// capture operation resolves to.
    pub fn to_jpeg_base64(&self, quality: u8) -> LensResult<String> {
        Ok(STANDARD.encode(self.to_jpeg(quality)?))
    }

    /// Copy out the pixels inside `bbox`, clamped to the frame.
    pub fn crop(&self, bbox: &BoundingBox) -> LensResult<Self> {
        let (x, y, w, h) = bbox.to_pixel_rect(self.size());
        if w == 0 || h == 0 {
            return Err(LensError::validation(
                "crop.bbox",
                "must overlap the frame",
                format!("{:?}", bbox),
            ));
        }
        let img = self.to_rgba_image()?;
        let cropped = image::imageops::crop_imm(&img, x, y, w, h).to_image();
        Ok(Self {
            data: Arc::new(cropped.into_raw()),
            width: w,
            height: h,
        })
    }

    /// RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + x as usize) * 4;
        self.data.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}
