//! # Vision Engine
//!
//! The vision module (document detection, panoramic stitching, card OCR,
//! LCD glare detection) is an opaque, versioned native component. This module
//! defines the request/response contract the rest of the crate consumes:
//!
//! 1. **[`VisionEngine`]**: the raw collaborator, one async call per operation
//! 2. **[`EngineClient`]**: the facade that owns the capability flags and turns
//!    calls made before setup into [`EngineOutcome::NotReady`]
//! 3. **Result types**: structured detections and images; raw engine memory
//!    never leaves the collaborator

pub mod client;
pub mod features;

use std::fmt;

use async_trait::async_trait;

use crate::core::{Point, Quadrilateral, RgbaFrame};
use crate::error::LensResult;

pub use client::EngineClient;
pub use features::{EngineFeatures, ModuleVariant};

/// One family of engine operations that needs one-time setup before use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The module itself is loaded.
    Module,
    Document,
    Stitcher,
    Card,
    Lcd,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Module => "module",
            Capability::Document => "document",
            Capability::Stitcher => "stitcher",
            Capability::Card => "card",
            Capability::Lcd => "lcd",
        };
        f.write_str(name)
    }
}

/// Result of a facade call: done, or skipped because a capability is not set up.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineOutcome<T> {
    Done(T),
    NotReady(Capability),
}

impl<T> EngineOutcome<T> {
    pub fn done(self) -> Option<T> {
        match self {
            EngineOutcome::Done(v) => Some(v),
            EngineOutcome::NotReady(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineOutcome::Done(_))
    }
}

/// Whether an install call did anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Install {
    Fresh,
    AlreadyInstalled,
}

/// Outcome of loading the module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    Loaded { variant: ModuleVariant },
    /// The host cannot run the engine; streaming must not start.
    Unsupported { features: EngineFeatures },
}

/// Result of one document detection call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentDetection {
    /// Engine status code; 0 means success.
    pub status: i32,
    /// Corners of every detected document, four per document.
    pub corners: Vec<Point>,
    pub document_count: u32,
}

impl DocumentDetection {
    /// Boundary of the first document, if the engine found one.
    pub fn quadrilateral(&self) -> Option<Quadrilateral> {
        if self.document_count == 0 {
            return None;
        }
        Quadrilateral::from_points(&self.corners).filter(|q| !q.is_degenerate())
    }
}

/// How a stitch call treats the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StitchMode {
    /// Track the document and refresh the preview, without accumulating.
    Preview,
    /// Add the frame to the panorama.
    Accumulate,
}

impl StitchMode {
    /// Operation name understood by the module.
    pub fn as_str(&self) -> &'static str {
        match self {
            StitchMode::Preview => "StitcherProcess",
            StitchMode::Accumulate => "Stitcher",
        }
    }
}

/// Result of one stitch call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StitchDetection {
    pub status: i32,
    pub corners: Vec<Point>,
    pub document_count: u32,
    /// Low-resolution panorama so far.
    pub preview: Option<RgbaFrame>,
}

impl StitchDetection {
    pub fn quadrilateral(&self) -> Option<Quadrilateral> {
        if self.document_count == 0 {
            return None;
        }
        Quadrilateral::from_points(&self.corners).filter(|q| !q.is_degenerate())
    }

    /// The preview is only meaningful on a successful call.
    pub fn should_update_preview(&self) -> bool {
        self.status == 0 && self.preview.is_some()
    }
}

/// An image produced by the engine together with its sharpness score.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineImage {
    pub frame: RgbaFrame,
    /// Negative means "not evaluated"; lower values mean more blur.
    pub blur_metric: f32,
}

/// Progress of the card auto-capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardStatus {
    Waiting,
    DocumentNotDetected,
    Done,
    NoModelDetected,
}

impl CardStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CardStatus::Waiting),
            1 => Some(CardStatus::DocumentNotDetected),
            2 => Some(CardStatus::Done),
            3 => Some(CardStatus::NoModelDetected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Waiting => "AutoCaptureResultWaiting",
            CardStatus::DocumentNotDetected => "AutoCaptureResultErrorDocumentNotDetected",
            CardStatus::Done => "AutoCaptureResultDone",
            CardStatus::NoModelDetected => "AutoCaptureResultNoModelDetected",
        }
    }
}

/// Partial card fields read from one frame. Empty strings mean "not read".
#[derive(Clone, Debug, PartialEq)]
pub struct CardDetection {
    pub status: CardStatus,
    pub number: String,
    pub name: String,
    pub date: String,
    pub cvv: String,
}

impl CardDetection {
    pub fn waiting() -> Self {
        Self {
            status: CardStatus::Waiting,
            number: String::new(),
            name: String::new(),
            date: String::new(),
            cvv: String::new(),
        }
    }
}

/// Which card fields the auto-capture should look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardTargets {
    pub number: bool,
    pub name: bool,
    pub date: bool,
    pub cvv: bool,
}

impl CardTargets {
    pub const ALL: CardTargets = CardTargets {
        number: true,
        name: true,
        date: true,
        cvv: true,
    };

    pub fn any(&self) -> bool {
        self.number || self.name || self.date || self.cvv
    }
}

impl Default for CardTargets {
    fn default() -> Self {
        Self::ALL
    }
}

/// Card detector setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardDetectorParams {
    /// Top of the detection window, percent of frame height.
    pub top: u32,
    /// Bottom of the detection window; `bottom - top` must be 50.
    pub bottom: u32,
    pub targets: CardTargets,
    pub load_number_model: bool,
    pub load_name_model: bool,
    pub load_date_cvv_model: bool,
    pub prefetch_lcd_model: bool,
}

impl Default for CardDetectorParams {
    fn default() -> Self {
        Self {
            top: 30,
            bottom: 80,
            targets: CardTargets::ALL,
            load_number_model: true,
            load_name_model: true,
            load_date_cvv_model: true,
            prefetch_lcd_model: true,
        }
    }
}

impl CardDetectorParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.bottom < self.top || self.bottom - self.top != 50 {
            return Err(format!(
                "bottom - top should be equal to 50 (top={}, bottom={})",
                self.top, self.bottom
            ));
        }
        Ok(())
    }
}

/// LCD screen detection probabilities.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct LcdResult {
    pub lcd_prob: f32,
    pub obj_prob: f32,
}

/// The opaque vision module.
///
/// Every call is a request/response future; implementations own any native
/// memory and hand back structured results.
#[async_trait]
pub trait VisionEngine: Send {
    /// What the host supports.
    fn features(&self) -> EngineFeatures;

    /// Load the given build of the module.
    async fn load(&mut self, variant: ModuleVariant) -> LensResult<()>;

    async fn init_document_detector(&mut self) -> LensResult<()>;

    /// Detect documents in a frame.
    async fn find_document(&mut self, frame: &RgbaFrame) -> LensResult<DocumentDetection>;

    async fn init_stitcher(&mut self) -> LensResult<()>;

    /// Track (and in [`StitchMode::Accumulate`], add) a frame.
    async fn stitch_frame(&mut self, frame: &RgbaFrame, mode: StitchMode) -> LensResult<StitchDetection>;

    /// The accumulated panorama. Accumulation state resets afterwards.
    async fn stitched_image(&mut self) -> LensResult<EngineImage>;

    /// Detect the document in `frame` and return it cropped and deskewed.
    async fn crop_document(&mut self, frame: &RgbaFrame) -> LensResult<EngineImage>;

    /// Crop `frame` to the region spanned by `corners`
    /// (top-left, top-right, bottom-left, bottom-right).
    async fn crop(&mut self, frame: &RgbaFrame, corners: [Point; 4]) -> LensResult<EngineImage>;

    async fn init_card_detector(&mut self, client_id: &str, params: &CardDetectorParams) -> LensResult<()>;

    async fn card_process_frame(&mut self, frame: &RgbaFrame) -> LensResult<CardDetection>;

    /// Restrict the auto-capture to the given fields.
    async fn reset_auto_capture(&mut self, targets: CardTargets) -> LensResult<()>;

    /// Read whatever the card detector can get from one frame, now.
    async fn force_card_result(&mut self, frame: &RgbaFrame) -> LensResult<CardDetection>;

    /// `None` when the detector has nothing for this frame.
    async fn detect_lcd(&mut self, frame: &RgbaFrame) -> LensResult<Option<LcdResult>>;

    /// Drop the registered result handler; setup state is kept.
    async fn release_callback(&mut self) -> LensResult<()>;

    /// Free native resources.
    async fn release(&mut self) -> LensResult<()> {
        Ok(())
    }
}
