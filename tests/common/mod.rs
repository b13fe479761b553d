//! Common test utilities and helpers for the document lens tests
//!
//! Scripted stand-ins for every host collaborator (camera, vision engine,
//! crop socket, display surface) plus frame helpers. Each mock hands out a
//! probe that stays readable after the mock is moved into a coordinator.

#![allow(dead_code)]

/// Test frame utilities and constants
pub mod test_frames {
    use doc_lens::core::{Point, RgbaFrame};
    use doc_lens::engine::DocumentDetection;

    /// Camera frame used by most tests: 4:3 and above the 512 px socket cap.
    pub const CAMERA_W: u32 = 1024;
    pub const CAMERA_H: u32 = 768;

    /// A frame with a bright rectangle on a dark background.
    pub fn document_frame(width: u32, height: u32) -> RgbaFrame {
        let mut data = vec![0u8; (width * height * 4) as usize];
        for y in 0..height {
            for x in 0..width {
                let inside = x > width / 8 && x < width * 7 / 8 && y > height / 8 && y < height * 7 / 8;
                let v = if inside { 230 } else { 30 };
                let i = ((y * width + x) * 4) as usize;
                data[i..i + 4].copy_from_slice(&[v, v, v, 255]);
            }
        }
        RgbaFrame::new(width, height, data).expect("valid test frame")
    }

    pub fn camera_frame() -> RgbaFrame {
        document_frame(CAMERA_W, CAMERA_H)
    }

    /// PNG bytes of a frame, for upload tests.
    pub fn png_bytes(frame: &RgbaFrame) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.as_ref().clone())
            .expect("frame buffer");
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).expect("png encode");
        out.into_inner()
    }

    /// Axis-aligned corners, clockwise from top-left.
    pub fn rect_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    pub fn found(x0: f64, y0: f64, x1: f64, y1: f64) -> DocumentDetection {
        DocumentDetection {
            status: 0,
            corners: rect_corners(x0, y0, x1, y1),
            document_count: 1,
        }
    }

    pub fn nothing() -> DocumentDetection {
        DocumentDetection::default()
    }

    /// Decode a capture payload back into a frame.
    pub fn decode(payload: &str) -> RgbaFrame {
        RgbaFrame::from_base64(payload).expect("capture payload is a valid JPEG")
    }
}

/// Mock camera that serves the same frame on every grab
pub mod mock_camera {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use doc_lens::capture::{Camera, CameraConstraints};
    use doc_lens::core::{RgbaFrame, Size};
    use doc_lens::error::{LensError, LensResult};

    #[derive(Clone, Default)]
    pub struct CameraProbe {
        pub starts: Arc<AtomicUsize>,
        pub stops: Arc<AtomicUsize>,
        pub grabs: Arc<AtomicUsize>,
        pub constraints: Arc<Mutex<Option<CameraConstraints>>>,
    }

    impl CameraProbe {
        pub fn grabs(&self) -> usize {
            self.grabs.load(Ordering::SeqCst)
        }

        pub fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }
    }

    pub struct MockCamera {
        frame: RgbaFrame,
        fail_start: bool,
        streaming: bool,
        torch: bool,
        probe: CameraProbe,
    }

    impl MockCamera {
        pub fn new(frame: RgbaFrame) -> Self {
            Self {
                frame,
                fail_start: false,
                streaming: false,
                torch: false,
                probe: CameraProbe::default(),
            }
        }

        /// A camera whose permission is always denied.
        pub fn denied(frame: RgbaFrame) -> Self {
            Self {
                fail_start: true,
                ..Self::new(frame)
            }
        }

        pub fn probe(&self) -> CameraProbe {
            self.probe.clone()
        }
    }

    #[async_trait]
    impl Camera for MockCamera {
        async fn start_stream(&mut self, constraints: &CameraConstraints) -> LensResult<()> {
            self.probe.starts.fetch_add(1, Ordering::SeqCst);
            *self.probe.constraints.lock().unwrap() = Some(*constraints);
            if self.fail_start {
                return Err(LensError::camera("NotAllowedError: Permission denied"));
            }
            self.streaming = true;
            Ok(())
        }

        async fn stop_stream(&mut self) -> LensResult<()> {
            if self.streaming {
                self.probe.stops.fetch_add(1, Ordering::SeqCst);
            }
            self.streaming = false;
            self.torch = false;
            Ok(())
        }

        async fn toggle_torch(&mut self) -> LensResult<bool> {
            self.torch = !self.torch;
            Ok(self.torch)
        }

        async fn grab_frame(&mut self) -> LensResult<RgbaFrame> {
            if !self.streaming {
                return Err(LensError::camera("stream is not running"));
            }
            self.probe.grabs.fetch_add(1, Ordering::SeqCst);
            Ok(self.frame.clone())
        }

        fn video_size(&self) -> Option<Size> {
            self.streaming.then(|| self.frame.size())
        }

        fn is_streaming(&self) -> bool {
            self.streaming
        }
    }
}

/// Mock vision engine answering from scripted queues
pub mod mock_engine {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use doc_lens::core::{BoundingBox, Point, RgbaFrame};
    use doc_lens::engine::{
        CardDetection, CardDetectorParams, CardTargets, DocumentDetection, EngineFeatures, EngineImage,
        LcdResult, ModuleVariant, StitchDetection, StitchMode, VisionEngine,
    };
    use doc_lens::error::{LensError, LensResult};

    /// Everything the engine was asked to do.
    #[derive(Clone, Default)]
    pub struct EngineProbe {
        pub calls: Arc<Mutex<Vec<String>>>,
        pub resets: Arc<Mutex<Vec<CardTargets>>>,
    }

    impl EngineProbe {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, name: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| c.as_str() == name).count()
        }

        pub fn resets(&self) -> Vec<CardTargets> {
            self.resets.lock().unwrap().clone()
        }
    }

    pub struct MockEngine {
        features: EngineFeatures,
        documents: VecDeque<DocumentDetection>,
        stitches: VecDeque<StitchDetection>,
        cards: VecDeque<CardDetection>,
        forced: CardDetection,
        stitched: Option<EngineImage>,
        lcd: Option<LcdResult>,
        lcd_fails: bool,
        delay: Duration,
        action_delay: Duration,
        probe: EngineProbe,
    }

    impl Default for MockEngine {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self {
                features: EngineFeatures { simd: true, threads: true },
                documents: VecDeque::new(),
                stitches: VecDeque::new(),
                cards: VecDeque::new(),
                forced: CardDetection::waiting(),
                stitched: None,
                lcd: None,
                lcd_fails: false,
                delay: Duration::ZERO,
                action_delay: Duration::ZERO,
                probe: EngineProbe::default(),
            }
        }

        pub fn probe(&self) -> EngineProbe {
            self.probe.clone()
        }

        pub fn with_features(mut self, features: EngineFeatures) -> Self {
            self.features = features;
            self
        }

        pub fn with_documents(mut self, documents: Vec<DocumentDetection>) -> Self {
            self.documents = documents.into();
            self
        }

        pub fn with_stitches(mut self, stitches: Vec<StitchDetection>) -> Self {
            self.stitches = stitches.into();
            self
        }

        pub fn with_cards(mut self, cards: Vec<CardDetection>) -> Self {
            self.cards = cards.into();
            self
        }

        pub fn with_forced(mut self, forced: CardDetection) -> Self {
            self.forced = forced;
            self
        }

        pub fn with_stitched(mut self, image: EngineImage) -> Self {
            self.stitched = Some(image);
            self
        }

        pub fn with_lcd(mut self, lcd: LcdResult) -> Self {
            self.lcd = Some(lcd);
            self
        }

        /// LCD detection errors on every call.
        pub fn with_failing_lcd(mut self) -> Self {
            self.lcd_fails = true;
            self
        }

        /// Every detection call takes this long.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// `reset_auto_capture` takes this long.
        pub fn with_action_delay(mut self, delay: Duration) -> Self {
            self.action_delay = delay;
            self
        }

        fn record(&self, call: impl Into<String>) {
            self.probe.calls.lock().unwrap().push(call.into());
        }

        async fn work(&self) {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }

    #[async_trait]
    impl VisionEngine for MockEngine {
        fn features(&self) -> EngineFeatures {
            self.features
        }

        async fn load(&mut self, variant: ModuleVariant) -> LensResult<()> {
            self.record(format!("load:{}", variant));
            Ok(())
        }

        async fn init_document_detector(&mut self) -> LensResult<()> {
            self.record("init_document_detector");
            Ok(())
        }

        async fn find_document(&mut self, _frame: &RgbaFrame) -> LensResult<DocumentDetection> {
            self.record("find_document");
            self.work().await;
            Ok(self.documents.pop_front().unwrap_or_default())
        }

        async fn init_stitcher(&mut self) -> LensResult<()> {
            self.record("init_stitcher");
            Ok(())
        }

        async fn stitch_frame(&mut self, _frame: &RgbaFrame, mode: StitchMode) -> LensResult<StitchDetection> {
            self.record(format!("stitch_frame:{}", mode.as_str()));
            self.work().await;
            Ok(self.stitches.pop_front().unwrap_or_default())
        }

        async fn stitched_image(&mut self) -> LensResult<EngineImage> {
            self.record("stitched_image");
            self.stitched
                .take()
                .ok_or_else(|| LensError::engine("stitched_image", "nothing accumulated"))
        }

        async fn crop_document(&mut self, frame: &RgbaFrame) -> LensResult<EngineImage> {
            self.record("crop_document");
            let bbox = BoundingBox {
                x: frame.width as f64 / 8.0,
                y: frame.height as f64 / 8.0,
                width: frame.width as f64 * 0.75,
                height: frame.height as f64 * 0.75,
            };
            Ok(EngineImage {
                frame: frame.crop(&bbox)?,
                blur_metric: 120.0,
            })
        }

        async fn crop(&mut self, frame: &RgbaFrame, corners: [Point; 4]) -> LensResult<EngineImage> {
            self.record("crop");
            let [tl, _, _, br] = corners;
            let bbox = BoundingBox {
                x: tl.x,
                y: tl.y,
                width: br.x - tl.x,
                height: br.y - tl.y,
            };
            Ok(EngineImage {
                frame: frame.crop(&bbox)?,
                blur_metric: 4.0,
            })
        }

        async fn init_card_detector(&mut self, _client_id: &str, params: &CardDetectorParams) -> LensResult<()> {
            self.record(format!("init_card_detector:{}-{}", params.top, params.bottom));
            Ok(())
        }

        async fn card_process_frame(&mut self, _frame: &RgbaFrame) -> LensResult<CardDetection> {
            self.record("card_process_frame");
            self.work().await;
            Ok(self.cards.pop_front().unwrap_or_else(CardDetection::waiting))
        }

        async fn reset_auto_capture(&mut self, targets: CardTargets) -> LensResult<()> {
            self.record("reset_auto_capture");
            if !self.action_delay.is_zero() {
                tokio::time::sleep(self.action_delay).await;
            }
            self.probe.resets.lock().unwrap().push(targets);
            Ok(())
        }

        async fn force_card_result(&mut self, _frame: &RgbaFrame) -> LensResult<CardDetection> {
            self.record("force_card_result");
            Ok(self.forced.clone())
        }

        async fn detect_lcd(&mut self, _frame: &RgbaFrame) -> LensResult<Option<LcdResult>> {
            self.record("detect_lcd");
            if self.lcd_fails {
                return Err(LensError::engine("detect_lcd", "lcd model crashed"));
            }
            Ok(self.lcd)
        }

        async fn release_callback(&mut self) -> LensResult<()> {
            self.record("release_callback");
            Ok(())
        }
    }
}

/// Mock crop socket with a scripted reply per sent frame
pub mod mock_transport {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use doc_lens::error::LensResult;
    use doc_lens::remote::CropTransport;

    /// How the server answers one frame.
    #[derive(Clone, Debug)]
    pub enum Reply {
        Text(String),
        Delayed(Duration, String),
        /// Never answer.
        Stall,
        /// Close the socket instead of answering.
        Close,
    }

    pub fn connect_event() -> String {
        r#"{"event":"connect"}"#.to_string()
    }

    pub fn contours(pairs: [[f64; 2]; 4]) -> String {
        serde_json::json!({
            "event": "cropped",
            "data": { "is_receipt": true, "contours": pairs }
        })
        .to_string()
    }

    pub fn not_receipt() -> String {
        serde_json::json!({
            "event": "cropped",
            "data": { "is_receipt": false, "contours": [] }
        })
        .to_string()
    }

    #[derive(Clone, Default)]
    pub struct TransportProbe {
        pub urls: Arc<Mutex<Vec<String>>>,
        pub sent: Arc<Mutex<Vec<String>>>,
        outstanding: Arc<AtomicUsize>,
        max_outstanding: Arc<AtomicUsize>,
    }

    impl TransportProbe {
        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        /// Most frames ever sent without their reply having been read.
        pub fn max_outstanding(&self) -> usize {
            self.max_outstanding.load(Ordering::SeqCst)
        }
    }

    pub struct MockTransport {
        inbound: VecDeque<Reply>,
        script: VecDeque<Reply>,
        greet: bool,
        ready_state: Option<u16>,
        probe: TransportProbe,
    }

    impl MockTransport {
        pub fn new(script: Vec<Reply>) -> Self {
            Self {
                inbound: VecDeque::new(),
                script: script.into(),
                greet: true,
                ready_state: None,
                probe: TransportProbe::default(),
            }
        }

        /// A server that accepts the connection but never sends `connect`.
        pub fn silent() -> Self {
            Self {
                greet: false,
                ..Self::new(Vec::new())
            }
        }

        pub fn probe(&self) -> TransportProbe {
            self.probe.clone()
        }
    }

    #[async_trait]
    impl CropTransport for MockTransport {
        async fn open(&mut self, url: &str) -> LensResult<()> {
            self.probe.urls.lock().unwrap().push(url.to_string());
            self.ready_state = Some(1);
            self.inbound.clear();
            if self.greet {
                self.inbound.push_back(Reply::Text(connect_event()));
            }
            Ok(())
        }

        async fn send_text(&mut self, text: String) -> LensResult<()> {
            self.probe.sent.lock().unwrap().push(text);
            let now = self.probe.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.max_outstanding.fetch_max(now, Ordering::SeqCst);
            let reply = self.script.pop_front().unwrap_or_else(|| Reply::Text(not_receipt()));
            self.inbound.push_back(reply);
            Ok(())
        }

        async fn next_text(&mut self) -> LensResult<Option<String>> {
            let Some(reply) = self.inbound.pop_front() else {
                std::future::pending::<()>().await;
                return Ok(None);
            };
            let text = match reply {
                Reply::Text(text) => text,
                Reply::Delayed(delay, text) => {
                    tokio::time::sleep(delay).await;
                    text
                }
                Reply::Stall => {
                    std::future::pending::<()>().await;
                    return Ok(None);
                }
                Reply::Close => {
                    self.ready_state = Some(3);
                    return Ok(None);
                }
            };
            if !text.contains(r#""connect""#) {
                let _ = self
                    .probe
                    .outstanding
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            }
            Ok(Some(text))
        }

        async fn close(&mut self) -> LensResult<()> {
            self.ready_state = Some(3);
            Ok(())
        }

        fn ready_state(&self) -> Option<u16> {
            self.ready_state
        }
    }
}

/// Surface that records what it was asked to show
pub mod recording_surface {
    use std::sync::{Arc, Mutex};

    use doc_lens::core::{RgbaFrame, Size};
    use doc_lens::processing::{OverlayCanvas, Surface};

    #[derive(Clone, Debug, Default)]
    pub struct SurfaceLog {
        /// One entry per overlay presentation: `true` if anything was drawn.
        pub overlays: Vec<bool>,
        pub previews: Vec<Size>,
        pub captures: Vec<Size>,
        pub releases: usize,
    }

    #[derive(Default)]
    pub struct RecordingSurface {
        log: Arc<Mutex<SurfaceLog>>,
        preview_size: Option<Size>,
    }

    impl RecordingSurface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_preview_size(mut self, size: Size) -> Self {
            self.preview_size = Some(size);
            self
        }

        pub fn log(&self) -> Arc<Mutex<SurfaceLog>> {
            self.log.clone()
        }
    }

    impl Surface for RecordingSurface {
        fn present_overlay(&mut self, canvas: &OverlayCanvas) {
            self.log.lock().unwrap().overlays.push(!canvas.is_transparent());
        }

        fn present_preview(&mut self, preview: &RgbaFrame) {
            self.log.lock().unwrap().previews.push(preview.size());
        }

        fn preview_size(&self) -> Option<Size> {
            self.preview_size
        }

        fn present_capture(&mut self, image: &RgbaFrame) {
            self.log.lock().unwrap().captures.push(image.size());
        }

        fn release(&mut self) {
            self.log.lock().unwrap().releases += 1;
        }
    }
}

/// Session validator that hands out a fixed key
pub mod mock_validator {
    use async_trait::async_trait;
    use doc_lens::error::{LensError, LensResult};
    use doc_lens::identity::SessionValidator;

    pub struct StaticValidator {
        pub client_id: String,
        pub session: String,
    }

    #[async_trait]
    impl SessionValidator for StaticValidator {
        async fn validate(&self, client_id: &str) -> LensResult<String> {
            if client_id != self.client_id {
                return Err(LensError::auth("validate_partner", "Wrong client id"));
            }
            Ok(self.session.clone())
        }
    }
}
