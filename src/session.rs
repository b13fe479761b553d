//! # Capture Session
//!
//! All live state of one camera session: mode and lifecycle, identity, the
//! current best quadrilateral, the retained full-resolution frame, the last
//! capture, and the card scan. A [`CaptureSession`] is owned by exactly one
//! coordinator; there is no process-wide state.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start_camera--> Streaming --capture*--> Capturing --> Stopped
//!   |                        |                                   ^
//!   +--camera refused--> Failed   +-----------stop_camera---------+
//! ```
//!
//! The `generation` counter is bumped whenever streaming starts or stops.
//! In-flight work records the generation it was dispatched under and its
//! result is dropped if the counter moved on.

use std::sync::Arc;

use serde::Serialize;

use crate::card::CardSequencer;
use crate::core::{Quadrilateral, RgbaFrame, Size};
use crate::engine::StitchMode;
use crate::error::LensError;
use crate::identity::DeviceIdentity;

/// Which capture pipeline a session runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CaptureMode {
    /// Frames go to the server-side cropper over the socket.
    RemoteSocket,
    /// Single-frame document detection in the local engine.
    LocalDocument,
    /// Multi-frame panoramic stitching in the local engine.
    LocalStitch,
    /// Payment card field capture.
    CardScan,
    /// No camera; images are uploaded by the host.
    UploadOnly,
}

impl CaptureMode {
    pub fn uses_camera(&self) -> bool {
        !matches!(self, CaptureMode::UploadOnly)
    }

    pub fn uses_engine(&self) -> bool {
        !matches!(self, CaptureMode::RemoteSocket)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LensState {
    Idle,
    Streaming,
    Capturing,
    Stopped,
    /// The camera could not be acquired.
    Failed,
}

/// Sharpness verdict for the last capture.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BlurStatus {
    pub is_blurry: bool,
    pub variance: f32,
}

impl BlurStatus {
    /// Variance at or above `threshold` is sharp; a negative variance means
    /// the engine did not evaluate it and is not reported as blurry.
    pub fn evaluate(variance: f32, threshold: f32) -> Self {
        let is_blurry = variance >= 0.0 && variance < threshold;
        Self { is_blurry, variance }
    }
}

/// Live state of one capture session.
#[derive(Debug)]
pub struct CaptureSession {
    pub mode: CaptureMode,
    pub state: LensState,
    pub session_key: String,
    pub client_id: String,
    pub identity: Option<DeviceIdentity>,
    /// Scale factor of the last frame sent for detection.
    pub scale_factor: f64,
    /// Best current boundary, in display space.
    pub quadrilateral: Quadrilateral,
    /// Full-resolution snapshot of the last sampled frame.
    pub full_frame: Option<RgbaFrame>,
    pub video_size: Option<Size>,
    /// Last captured image and its JPEG payload.
    pub cropped: Option<RgbaFrame>,
    pub cropped_b64: Option<String>,
    pub blur: Option<BlurStatus>,
    pub is_document: bool,
    pub card: Option<CardSequencer>,
    pub stitch_mode: StitchMode,
    pub generation: u64,
    pub last_error: Option<Arc<LensError>>,
    pub has_init: bool,
}

impl CaptureSession {
    pub fn new(mode: CaptureMode) -> Self {
        Self {
            mode,
            state: LensState::Idle,
            session_key: String::new(),
            client_id: String::new(),
            identity: None,
            scale_factor: 1.0,
            quadrilateral: Quadrilateral::empty(),
            full_frame: None,
            video_size: None,
            cropped: None,
            cropped_b64: None,
            blur: None,
            is_document: false,
            card: None,
            stitch_mode: StitchMode::Preview,
            generation: 0,
            last_error: None,
            has_init: false,
        }
    }

    /// Re-arm for a new mode, keeping identity and session credentials.
    pub fn reset_for(&mut self, mode: CaptureMode) {
        let identity = self.identity.take();
        let session_key = std::mem::take(&mut self.session_key);
        let client_id = std::mem::take(&mut self.client_id);
        let generation = self.generation + 1;
        *self = Self::new(mode);
        self.identity = identity;
        self.session_key = session_key;
        self.client_id = client_id;
        self.generation = generation;
    }

    pub fn has_coordinates(&self) -> bool {
        !self.quadrilateral.is_empty()
    }

    /// Invalidate everything in flight.
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state == LensState::Streaming
    }

    pub fn record_error(&mut self, error: LensError) -> Arc<LensError> {
        let error = Arc::new(error);
        self.last_error = Some(error.clone());
        error
    }
}
