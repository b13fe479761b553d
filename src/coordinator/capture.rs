//! Freezing a session into a final image.
//!
//! Every capture stops the tick loop and the camera first, so no in-flight
//! result can touch the session afterwards, then materialises the image from
//! the retained full-resolution frame. The image is kept on the session and
//! returned as a base64 JPEG.

use log::{info, warn};

use crate::card::CardFields;
use crate::coordinator::CaptureCoordinator;
use crate::core::{Quadrilateral, RgbaFrame};
use crate::engine::{EngineImage, EngineOutcome};
use crate::error::{LensError, LensResult};
use crate::session::{BlurStatus, CaptureMode, LensState};

/// Blur metric of images the engine did not evaluate.
const NOT_EVALUATED: f32 = -1.0;

fn unevaluated(frame: RgbaFrame) -> EngineImage {
    EngineImage {
        frame,
        blur_metric: NOT_EVALUATED,
    }
}

impl CaptureCoordinator {
    /// Stop streaming and hand back the frozen quadrilateral and frame.
    ///
    /// A session already captured returns `Ok(None)` so the caller can reuse
    /// the previous result.
    async fn freeze(&self, operation: &str) -> LensResult<Option<(Quadrilateral, RgbaFrame)>> {
        {
            let s = self.inner.session.lock().await;
            if s.state == LensState::Stopped && s.cropped_b64.is_some() {
                return Ok(None);
            }
        }
        self.halt(LensState::Capturing).await?;
        let s = self.inner.session.lock().await;
        let frame = s.full_frame.clone().ok_or_else(|| {
            LensError::state(format!("{:?}", s.state), operation, "no frame has been sampled yet")
        })?;
        Ok(Some((s.quadrilateral.clone(), frame)))
    }

    /// Record the capture, clear the overlay and encode the payload.
    async fn finish(&self, image: EngineImage, is_document: bool) -> LensResult<String> {
        let payload = image.frame.to_jpeg_base64(self.inner.config.jpeg_quality)?;
        {
            let mut s = self.inner.session.lock().await;
            s.blur = Some(BlurStatus::evaluate(image.blur_metric, self.inner.config.blur_threshold));
            s.is_document = is_document;
            s.cropped = Some(image.frame.clone());
            s.cropped_b64 = Some(payload.clone());
            s.quadrilateral = Quadrilateral::empty();
            s.state = LensState::Stopped;
        }
        self.inner.overlay.lock().await.release();
        self.inner.surface.lock().await.present_capture(&image.frame);
        if let Some(engine) = self.inner.engine.lock().await.as_mut() {
            engine.release_callback().await?;
        }
        info!(
            "[EVENT] captured: {}x{} is_document={}",
            image.frame.width, image.frame.height, is_document
        );
        Ok(payload)
    }

    async fn previous_capture(&self) -> LensResult<String> {
        self.inner
            .session
            .lock()
            .await
            .cropped_b64
            .clone()
            .ok_or_else(|| LensError::state("Stopped", "capture", "no previous capture"))
    }

    /// Crop `frame` to the bounding box of `quad`, with the engine if it can,
    /// locally otherwise. `None` when the box misses the frame.
    async fn crop_to_box(&self, frame: &RgbaFrame, quad: &Quadrilateral) -> LensResult<Option<EngineImage>> {
        let Some(bbox) = quad.bounding_box().filter(|b| b.overlaps(frame.size())) else {
            warn!("[EVENT] crop_box_outside_frame: {:?}", quad.corners());
            return Ok(None);
        };
        if let Some(engine) = self.inner.engine.lock().await.as_mut() {
            if let EngineOutcome::Done(image) = engine.crop_to_quadrilateral(frame, quad).await? {
                return Ok(Some(image));
            }
        }
        Ok(Some(unevaluated(frame.crop(&bbox)?)))
    }

    /// Hand back the crop as a document, or the whole frame when there is none.
    async fn finish_cropped(&self, cropped: Option<EngineImage>, frame: RgbaFrame) -> LensResult<String> {
        match cropped {
            Some(image) => self.finish(image, true).await,
            None => self.finish(unevaluated(frame), false).await,
        }
    }

    /// Capture in remote mode: crop the frozen frame to the last contour's
    /// bounding box, or return it untouched when no contour is known.
    pub async fn capture(&self) -> LensResult<String> {
        let Some((quad, frame)) = self.freeze("capture").await? else {
            return self.previous_capture().await;
        };
        if quad.is_degenerate() {
            return self.finish(unevaluated(frame), false).await;
        }
        let cropped = self.crop_to_box(&frame, &quad).await?;
        self.finish_cropped(cropped, frame).await
    }

    /// Capture in local document mode: the engine detects and crops the
    /// document in the full-resolution frame.
    pub async fn capture_document(&self) -> LensResult<String> {
        let Some((quad, frame)) = self.freeze("capture_document").await? else {
            return self.previous_capture().await;
        };
        if quad.is_degenerate() {
            return self.finish(unevaluated(frame), false).await;
        }
        let cropped = match self.inner.engine.lock().await.as_mut() {
            Some(engine) => engine.crop_document(&frame).await?,
            None => EngineOutcome::NotReady(crate::engine::Capability::Module),
        };
        match cropped {
            EngineOutcome::Done(image) => self.finish(image, true).await,
            EngineOutcome::NotReady(capability) => {
                warn!("[EVENT] crop_document_unavailable: {}", capability);
                let cropped = self.crop_to_box(&frame, &quad).await?;
                self.finish_cropped(cropped, frame).await
            }
        }
    }

    /// Capture the stitched panorama.
    pub async fn capture_long(&self) -> LensResult<String> {
        let Some((_, frame)) = self.freeze("capture_long").await? else {
            return self.previous_capture().await;
        };
        let stitched = match self.inner.engine.lock().await.as_mut() {
            Some(engine) => engine.stitched_image().await?,
            None => EngineOutcome::NotReady(crate::engine::Capability::Module),
        };
        match stitched {
            EngineOutcome::Done(image) => self.finish(image, true).await,
            EngineOutcome::NotReady(capability) => {
                warn!("[EVENT] stitcher_unavailable: {}", capability);
                self.finish(unevaluated(frame), false).await
            }
        }
    }

    /// Run one detection on an uploaded image and crop it if a document is found.
    pub async fn capture_uploaded(&self, bytes: &[u8]) -> LensResult<String> {
        {
            let s = self.inner.session.lock().await;
            if !s.has_init {
                return Err(LensError::state(format!("{:?}", s.state), "capture_uploaded", "session is not initialised"));
            }
        }
        let frame = RgbaFrame::from_encoded(bytes)?;
        {
            let mut s = self.inner.session.lock().await;
            s.full_frame = Some(frame.clone());
            s.video_size = Some(frame.size());
        }

        let detected = match self.inner.engine.lock().await.as_mut() {
            Some(engine) => engine.detect_document(&frame).await?.done().and_then(|d| d.quadrilateral()),
            None => None,
        };
        let cropped = match detected {
            Some(quad) => self.crop_to_box(&frame, &quad).await?,
            None => None,
        };
        self.finish_cropped(cropped, frame).await
    }

    /// Force a card reading from the last frame and finish the scan.
    pub async fn capture_card(&self) -> LensResult<CardFields> {
        {
            let s = self.inner.session.lock().await;
            if s.mode != CaptureMode::CardScan {
                return Err(LensError::state(format!("{:?}", s.mode), "capture_card", "not in card mode"));
            }
            if let Some(card) = s.card.as_ref().filter(|c| !c.should_process()) {
                return Ok(card.fields().clone());
            }
        }
        self.halt(LensState::Capturing).await?;
        let frame = self
            .inner
            .session
            .lock()
            .await
            .full_frame
            .clone()
            .ok_or_else(|| LensError::state("Capturing", "capture_card", "no frame has been sampled yet"))?;

        let forced = match self.inner.engine.lock().await.as_mut() {
            Some(engine) => engine.force_card_result(&frame).await?,
            None => EngineOutcome::NotReady(crate::engine::Capability::Module),
        };
        let detection = match forced {
            EngineOutcome::Done(detection) => detection,
            EngineOutcome::NotReady(capability) => {
                return Err(LensError::engine("force_card_result", format!("{} is not ready", capability)));
            }
        };

        let fields = {
            let mut s = self.inner.session.lock().await;
            s.state = LensState::Stopped;
            let card = s
                .card
                .as_mut()
                .ok_or_else(|| LensError::state("CardScan", "capture_card", "card scan was not initialised"))?;
            card.on_forced(&detection);
            card.fields().clone()
        };
        if let Some(engine) = self.inner.engine.lock().await.as_mut() {
            engine.release_callback().await?;
        }
        info!("[EVENT] card_forced: missing={:?}", fields.missing());
        Ok(fields)
    }
}
