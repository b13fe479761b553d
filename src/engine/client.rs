//! Typed facade over the vision module.
//!
//! The facade tracks which capabilities have completed their one-time setup.
//! Installing an already installed capability is a no-op, and calling an
//! operation whose capability is missing returns
//! [`EngineOutcome::NotReady`] without touching the module.

use log::{debug, info, warn};

use crate::core::{Quadrilateral, RgbaFrame};
use crate::engine::{
    Capability, CardDetection, CardDetectorParams, CardTargets, DocumentDetection, EngineImage,
    EngineOutcome, EngineStatus, Install, LcdResult, StitchDetection, StitchMode, VisionEngine,
};
use crate::error::{LensError, LensResult};

#[derive(Clone, Copy, Debug, Default)]
struct Flags {
    document: bool,
    stitcher: bool,
    card: bool,
    lcd: bool,
}

pub struct EngineClient {
    engine: Box<dyn VisionEngine>,
    client_id: String,
    status: Option<EngineStatus>,
    flags: Flags,
    lcd_interval: u64,
    frame_count: u64,
    lcd_result: Option<LcdResult>,
}

impl EngineClient {
    pub fn new(engine: Box<dyn VisionEngine>, client_id: impl Into<String>, lcd_interval: u64) -> Self {
        Self {
            engine,
            client_id: client_id.into(),
            status: None,
            flags: Flags::default(),
            lcd_interval: lcd_interval.max(1),
            frame_count: 0,
            lcd_result: None,
        }
    }

    pub fn set_client_id(&mut self, client_id: impl Into<String>) {
        self.client_id = client_id.into();
    }

    /// Load the module build matching the host. Loading twice returns the
    /// first status; an unsupported host is reported, not raised.
    pub async fn load(&mut self, user_agent: &str) -> LensResult<EngineStatus> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let features = self.engine.features();
        let status = match features.select_variant(user_agent) {
            None => {
                warn!("[EVENT] engine_unsupported: threads={} simd={}", features.threads, features.simd);
                EngineStatus::Unsupported { features }
            }
            Some(variant) => {
                self.engine
                    .load(variant)
                    .await
                    .map_err(|e| e.with_operation("engine_load"))?;
                info!("[EVENT] engine_loaded: variant={}", variant);
                EngineStatus::Loaded { variant }
            }
        };
        self.status = Some(status);
        Ok(status)
    }

    pub fn status(&self) -> Option<EngineStatus> {
        self.status
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status, Some(EngineStatus::Loaded { .. }))
    }

    pub fn is_ready(&self, capability: Capability) -> bool {
        match capability {
            Capability::Module => self.is_loaded(),
            Capability::Document => self.is_loaded() && self.flags.document,
            Capability::Stitcher => self.is_loaded() && self.flags.stitcher,
            Capability::Card => self.is_loaded() && self.flags.card,
            Capability::Lcd => self.is_loaded() && self.flags.lcd,
        }
    }

    fn require(&self, capability: Capability) -> Option<Capability> {
        if !self.is_loaded() {
            return Some(Capability::Module);
        }
        (!self.is_ready(capability)).then_some(capability)
    }

    pub async fn install_document_detector(&mut self) -> LensResult<EngineOutcome<Install>> {
        if !self.is_loaded() {
            return Ok(EngineOutcome::NotReady(Capability::Module));
        }
        if self.flags.document {
            return Ok(EngineOutcome::Done(Install::AlreadyInstalled));
        }
        self.engine.init_document_detector().await?;
        self.flags.document = true;
        debug!("[EVENT] capability_installed: document");
        Ok(EngineOutcome::Done(Install::Fresh))
    }

    pub async fn install_stitcher(&mut self) -> LensResult<EngineOutcome<Install>> {
        if !self.is_loaded() {
            return Ok(EngineOutcome::NotReady(Capability::Module));
        }
        if self.flags.stitcher {
            return Ok(EngineOutcome::Done(Install::AlreadyInstalled));
        }
        self.engine.init_stitcher().await?;
        self.flags.stitcher = true;
        debug!("[EVENT] capability_installed: stitcher");
        Ok(EngineOutcome::Done(Install::Fresh))
    }

    /// Install the card detector. The window is checked before anything else;
    /// a successful install also makes LCD detection available.
    pub async fn install_card_detector(
        &mut self,
        params: &CardDetectorParams,
    ) -> LensResult<EngineOutcome<Install>> {
        params.validate().map_err(|reason| {
            LensError::validation(
                "card_window",
                reason,
                format!("top={} bottom={}", params.top, params.bottom),
            )
        })?;
        if !self.is_loaded() {
            return Ok(EngineOutcome::NotReady(Capability::Module));
        }
        if self.flags.card {
            return Ok(EngineOutcome::Done(Install::AlreadyInstalled));
        }
        self.engine.init_card_detector(&self.client_id, params).await?;
        self.flags.card = true;
        self.flags.lcd = true;
        self.frame_count = 0;
        self.lcd_result = None;
        debug!("[EVENT] capability_installed: card+lcd");
        Ok(EngineOutcome::Done(Install::Fresh))
    }

    pub async fn detect_document(&mut self, frame: &RgbaFrame) -> LensResult<EngineOutcome<DocumentDetection>> {
        if let Some(missing) = self.require(Capability::Document) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        Ok(EngineOutcome::Done(self.engine.find_document(frame).await?))
    }

    pub async fn stitch_frame(
        &mut self,
        frame: &RgbaFrame,
        mode: StitchMode,
    ) -> LensResult<EngineOutcome<StitchDetection>> {
        if let Some(missing) = self.require(Capability::Stitcher) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        Ok(EngineOutcome::Done(self.engine.stitch_frame(frame, mode).await?))
    }

    pub async fn stitched_image(&mut self) -> LensResult<EngineOutcome<EngineImage>> {
        if let Some(missing) = self.require(Capability::Stitcher) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        Ok(EngineOutcome::Done(self.engine.stitched_image().await?))
    }

    /// Let the engine find and crop the document in `frame` on its own.
    pub async fn crop_document(&mut self, frame: &RgbaFrame) -> LensResult<EngineOutcome<EngineImage>> {
        if let Some(missing) = self.require(Capability::Document) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        Ok(EngineOutcome::Done(self.engine.crop_document(frame).await?))
    }

    /// Crop `frame` to the bounding box of `quad`.
    pub async fn crop_to_quadrilateral(
        &mut self,
        frame: &RgbaFrame,
        quad: &Quadrilateral,
    ) -> LensResult<EngineOutcome<EngineImage>> {
        if let Some(missing) = self.require(Capability::Module) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        let bbox = quad
            .bounding_box()
            .ok_or_else(|| LensError::validation("quadrilateral", "non-empty", "empty"))?;
        Ok(EngineOutcome::Done(self.engine.crop(frame, bbox.crop_corners()).await?))
    }

    /// Run the card detector on a frame, sampling LCD detection every
    /// `lcd_interval` frames.
    pub async fn process_card_frame(&mut self, frame: &RgbaFrame) -> LensResult<EngineOutcome<CardDetection>> {
        if let Some(missing) = self.require(Capability::Card) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        let detection = self.engine.card_process_frame(frame).await?;
        let sample_lcd = self.frame_count % self.lcd_interval == 0;
        self.frame_count += 1;
        if sample_lcd {
            match self.detect_lcd(frame).await {
                Ok(EngineOutcome::Done(lcd)) => self.lcd_result = lcd,
                Ok(EngineOutcome::NotReady(_)) => {}
                Err(e) => warn!("[EVENT] lcd_detection_failed: {}", e),
            }
        }
        Ok(EngineOutcome::Done(detection))
    }

    pub async fn reset_auto_capture(&mut self, targets: CardTargets) -> LensResult<EngineOutcome<()>> {
        if let Some(missing) = self.require(Capability::Card) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        debug!(
            "[EVENT] reset_auto_capture: number={} name={} date={} cvv={}",
            targets.number, targets.name, targets.date, targets.cvv
        );
        self.engine.reset_auto_capture(targets).await?;
        Ok(EngineOutcome::Done(()))
    }

    /// Force a card reading; the returned status is always `Done`.
    pub async fn force_card_result(&mut self, frame: &RgbaFrame) -> LensResult<EngineOutcome<CardDetection>> {
        if let Some(missing) = self.require(Capability::Card) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        let mut detection = self.engine.force_card_result(frame).await?;
        detection.status = crate::engine::CardStatus::Done;
        Ok(EngineOutcome::Done(detection))
    }

    pub async fn detect_lcd(&mut self, frame: &RgbaFrame) -> LensResult<EngineOutcome<Option<LcdResult>>> {
        if let Some(missing) = self.require(Capability::Lcd) {
            return Ok(EngineOutcome::NotReady(missing));
        }
        Ok(EngineOutcome::Done(self.engine.detect_lcd(frame).await?))
    }

    /// Latest sampled LCD result.
    pub fn lcd_status(&self) -> Option<LcdResult> {
        self.lcd_result
    }

    /// Drop the registered result handler. Capabilities stay installed.
    pub async fn release_callback(&mut self) -> LensResult<()> {
        if !self.is_loaded() {
            return Ok(());
        }
        self.engine.release_callback().await
    }

    pub async fn release(&mut self) -> LensResult<()> {
        if !self.is_loaded() {
            return Ok(());
        }
        self.engine.release().await
    }
}
