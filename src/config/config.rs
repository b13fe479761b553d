//! # Lens Configuration
//!
//! All tunables of a capture session in one place. The defaults reproduce the
//! production lens: a 250 ms tick, a 512 px cap for frames sent over the crop
//! socket, full-resolution frames for the local engine, and a 3 s pause for
//! flipping a card over.
//!
//! | Parameter | Default | Description |
//! |-----------|---------|-------------|
//! | `interval_ms` | 250 | Tick period of the sampling loop |
//! | `socket_max_shape` | 512 | Longest side of frames sent to the crop socket |
//! | `engine_max_shape` | none | Optional longest side of frames given to the local engine |
//! | `box_color` | `rgba(84, 192, 139, 0.6)` | Overlay fill colour |
//! | `flip_delay_ms` | 3000 | Time given to flip a card between front and back |
//! | `transport_timeout_ms` | 5000 | Stall watchdog for one in-flight call |
//!
//! ## Examples
//!
//! ```rust
//! use doc_lens::config::LensConfig;
//!
//! let config = LensConfig::from_json_str(r#"{ "interval_ms": 500 }"#).unwrap();
//! assert_eq!(config.interval_ms, 500);
//! assert_eq!(config.socket_max_shape, 512);
//! assert!(config.validate().is_ok());
//! ```

use serde::Deserialize;

use crate::error::{LensError, LensResult};
use crate::processing::overlay::{BoxColor, OverlayShape};

pub const DEFAULT_BOX_COLOR: &str = "rgba(84, 192, 139, 0.6)";
pub const DEFAULT_SOCKET_URL: &str = "wss://lens.veryfi.com/ws/crop";
pub const DEFAULT_VALIDATE_URL: &str = "https://lens.veryfi.com/rest/validate_partner";

/// Configuration for one lens coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Tick period of the sampling loop in milliseconds. Must be greater than 0.
    pub interval_ms: u64,

    /// Longest side, in pixels, of frames sent over the crop socket.
    ///
    /// Larger frames are downscaled proportionally and the detected contours
    /// are divided by the scale factor before they are displayed.
    pub socket_max_shape: u32,

    /// Optional longest side of frames handed to the local engine.
    ///
    /// `None` keeps full resolution, which is what the engine's detectors are
    /// tuned for.
    pub engine_max_shape: Option<u32>,

    /// Overlay fill colour as a CSS colour string.
    pub box_color: String,

    /// Geometry drawn for a detected quadrilateral.
    pub overlay_shape: OverlayShape,

    /// Base URL of the crop socket; a connection id is appended per connection.
    pub socket_url: String,

    /// Partner validation endpoint exchanging a client id for a session key.
    pub validate_url: String,

    /// Time, in milliseconds, the card sequencer waits for the card to be flipped.
    pub flip_delay_ms: u64,

    /// Stall watchdog for one in-flight transport or engine call.
    pub transport_timeout_ms: u64,

    /// How long to wait for the socket's `connect` event.
    pub connect_timeout_ms: u64,

    /// LCD glare detection runs once every this many processed card frames.
    pub lcd_interval: u64,

    /// Blur metrics at or above this value are considered sharp.
    pub blur_threshold: f32,

    /// JPEG quality (1-100) of produced payloads.
    pub jpeg_quality: u8,

    /// Top of the card detection window, in percent of frame height.
    pub card_window_top: u32,

    /// Bottom of the card detection window; `bottom - top` must equal 50.
    pub card_window_bottom: u32,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            socket_max_shape: 512,
            engine_max_shape: None,
            box_color: DEFAULT_BOX_COLOR.to_string(),
            overlay_shape: OverlayShape::Contour,
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            validate_url: DEFAULT_VALIDATE_URL.to_string(),
            flip_delay_ms: 3000,
            transport_timeout_ms: 5000,
            connect_timeout_ms: 10_000,
            lcd_interval: 5,
            blur_threshold: 10.0,
            jpeg_quality: 92,
            card_window_top: 30,
            card_window_bottom: 80,
        }
    }
}

impl LensConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> LensResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|reason| LensError::config("lens_config", json, reason))?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms == 0 {
            return Err("Tick interval must be greater than 0 ms".to_string());
        }
        if self.socket_max_shape == 0 {
            return Err("Socket frame cap must be greater than 0 px".to_string());
        }
        if self.engine_max_shape == Some(0) {
            return Err("Engine frame cap must be greater than 0 px when set".to_string());
        }
        if BoxColor::parse(&self.box_color).is_none() {
            return Err(format!("Unrecognised box colour '{}'", self.box_color));
        }
        if self.transport_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err("Timeouts must be greater than 0 ms".to_string());
        }
        if self.lcd_interval == 0 {
            return Err("LCD interval must be at least 1 frame".to_string());
        }
        if !(self.blur_threshold >= 0.0) {
            return Err("Blur threshold must be a non-negative number".to_string());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }
        if self.card_window_bottom < self.card_window_top
            || self.card_window_bottom - self.card_window_top != 50
        {
            return Err("Card window bottom - top must equal 50".to_string());
        }
        Ok(())
    }

    /// Socket URL for a connection id (epoch milliseconds in production).
    pub fn socket_url_for(&self, connection_id: u128) -> String {
        format!("{}/{}", self.socket_url.trim_end_matches('/'), connection_id)
    }

    /// The parsed overlay colour, falling back to the default on bad input.
    pub fn parsed_box_color(&self) -> BoxColor {
        BoxColor::parse(&self.box_color).unwrap_or_default()
    }
}
