//! # Capture Coordinator
//!
//! The state machine that drives a capture session. On a fixed tick it
//! samples the camera, admits at most one detection call at a time, applies
//! detection results to the session's quadrilateral and overlay, and on
//! request freezes the session into a final image.
//!
//! ## Architecture
//!
//! - **Admission**: a one-permit [`Semaphore`]; the permit is held by the
//!   in-flight call until its result has been applied to the session
//! - **Liveness**: every dispatch records the session generation and results
//!   are only applied if it is still current and the session is streaming
//! - **Collaborators**: camera, engine, socket and surface are trait objects
//!   supplied through [`CaptureCoordinatorBuilder`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use doc_lens::coordinator::CaptureCoordinator;
//! # async fn run(camera: Box<dyn doc_lens::capture::Camera>, transport: Box<dyn doc_lens::remote::CropTransport>) -> doc_lens::error::LensResult<()> {
//! let lens = CaptureCoordinator::builder()
//!     .with_camera(camera)
//!     .with_transport(transport)
//!     .build()?;
//! lens.init_remote(Some("session-key".into()), "client-id").await?;
//! lens.start_camera().await?;
//! // ... later
//! let jpeg_b64 = lens.capture().await?;
//! # let _ = jpeg_b64;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod capture;
pub mod tick;

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{Mutex, Semaphore};

use crate::capture::{Camera, CameraConstraints, FrameSampler};
use crate::card::{CardFields, CardPhase, CardSequencer};
use crate::config::LensConfig;
use crate::engine::{CardDetectorParams, CardTargets, EngineClient, EngineOutcome, EngineStatus, LcdResult, StitchMode};
use crate::error::{LensError, LensResult};
use crate::identity::{DeviceData, DeviceIdentity, DeviceTraits, Fingerprinter, SessionValidator};
use crate::processing::{BoxColor, OverlayRenderer, PreviewScaler, Surface};
use crate::remote::{RemoteCropClient, SocketStatus};
use crate::session::{BlurStatus, CaptureMode, CaptureSession, LensState};

pub use builder::CaptureCoordinatorBuilder;
pub use tick::{DispatchOutcome, InFlight, SkipReason, TickOutcome};

pub(crate) struct Inner {
    pub(crate) config: LensConfig,
    pub(crate) traits: DeviceTraits,
    pub(crate) session: Mutex<CaptureSession>,
    pub(crate) camera: Mutex<Option<Box<dyn Camera>>>,
    pub(crate) engine: Mutex<Option<EngineClient>>,
    pub(crate) remote: Mutex<Option<RemoteCropClient>>,
    pub(crate) surface: Mutex<Box<dyn Surface>>,
    pub(crate) overlay: Mutex<OverlayRenderer>,
    pub(crate) preview: Mutex<PreviewScaler>,
    pub(crate) sampler: Mutex<FrameSampler>,
    pub(crate) validator: Arc<dyn SessionValidator>,
    pub(crate) fingerprinter: Arc<dyn Fingerprinter>,
    pub(crate) admission: Arc<Semaphore>,
    pub(crate) ticker: Mutex<Option<tick::Ticker>>,
    pub(crate) auto_tick: bool,
}

/// Drives one capture session. Cloning shares the session.
#[derive(Clone)]
pub struct CaptureCoordinator {
    pub(crate) inner: Arc<Inner>,
}

impl CaptureCoordinator {
    pub fn builder() -> CaptureCoordinatorBuilder {
        CaptureCoordinatorBuilder::new()
    }

    pub fn config(&self) -> &LensConfig {
        &self.inner.config
    }

    // ---- initialisation -------------------------------------------------

    /// Tear down any previous streaming and re-arm the session for `mode`.
    async fn prepare(&self, mode: CaptureMode, session: Option<String>, client_id: &str) -> LensResult<()> {
        self.stop_camera().await?;
        let identity = self.identity().await?;
        info!("[EVENT] Device ID {}", identity.device_id());

        let mut s = self.inner.session.lock().await;
        s.reset_for(mode);
        s.client_id = client_id.to_string();
        if let Some(key) = session {
            s.session_key = key;
        }
        Ok(())
    }

    /// Device identity, computed on first use.
    async fn identity(&self) -> LensResult<DeviceIdentity> {
        if let Some(identity) = self.inner.session.lock().await.identity.clone() {
            return Ok(identity);
        }
        let identity = DeviceIdentity::resolve(&self.inner.traits, self.inner.fingerprinter.as_ref()).await?;
        self.inner.session.lock().await.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Initialise the remote socket mode and wait for the server's `connect` event.
    pub async fn init_remote(&self, session: Option<String>, client_id: &str) -> LensResult<()> {
        self.prepare(CaptureMode::RemoteSocket, session, client_id).await?;
        let (device_id, session_key) = {
            let s = self.inner.session.lock().await;
            let device_id = s.identity.as_ref().map(|i| i.device_id()).unwrap_or_default();
            (device_id, s.session_key.clone())
        };

        let url = self.inner.config.socket_url_for(epoch_millis());
        let wait = std::time::Duration::from_millis(self.inner.config.connect_timeout_ms);
        let connected = {
            let mut remote = self.inner.remote.lock().await;
            let client = remote.as_mut().ok_or_else(|| {
                LensError::config("transport", "none", "remote mode needs a crop transport")
            })?;
            client.set_device_id(device_id);
            client.set_session_key(session_key);
            client.connect(&url, wait).await
        };
        if let Err(e) = connected {
            error!("[EVENT] socket_connect_failed: {}", e);
            return Err(e);
        }

        self.inner.session.lock().await.has_init = true;
        Ok(())
    }

    /// Initialise single-frame document detection in the local engine.
    ///
    /// An engine the host cannot run is reported as
    /// [`EngineStatus::Unsupported`]; the camera may still start but no frame
    /// is ever processed.
    pub async fn init_document(&self, session: Option<String>, client_id: &str) -> LensResult<EngineStatus> {
        self.init_local(CaptureMode::LocalDocument, session, client_id, None).await
    }

    /// Initialise panoramic stitching in the local engine.
    pub async fn init_stitch(&self, session: Option<String>, client_id: &str) -> LensResult<EngineStatus> {
        self.init_local(CaptureMode::LocalStitch, session, client_id, None).await
    }

    /// Initialise upload-only mode: the engine without a camera.
    pub async fn init_upload(&self, session: Option<String>, client_id: &str) -> LensResult<EngineStatus> {
        self.init_local(CaptureMode::UploadOnly, session, client_id, None).await
    }

    /// Initialise card scanning with the configured detection window.
    pub async fn init_card(&self, session: Option<String>, client_id: &str) -> LensResult<EngineStatus> {
        let params = CardDetectorParams {
            top: self.inner.config.card_window_top,
            bottom: self.inner.config.card_window_bottom,
            targets: CardTargets::ALL,
            ..Default::default()
        };
        self.init_card_with(session, client_id, params).await
    }

    /// Initialise card scanning with explicit detector parameters.
    pub async fn init_card_with(
        &self,
        session: Option<String>,
        client_id: &str,
        params: CardDetectorParams,
    ) -> LensResult<EngineStatus> {
        self.init_local(CaptureMode::CardScan, session, client_id, Some(params)).await
    }

    async fn init_local(
        &self,
        mode: CaptureMode,
        session: Option<String>,
        client_id: &str,
        card: Option<CardDetectorParams>,
    ) -> LensResult<EngineStatus> {
        if let Some(params) = &card {
            params.validate().map_err(|reason| {
                LensError::validation("card_window", reason, format!("{}..{}", params.top, params.bottom))
            })?;
        }
        self.prepare(mode, session, client_id).await?;

        let status = {
            let mut guard = self.inner.engine.lock().await;
            let engine = guard
                .as_mut()
                .ok_or_else(|| LensError::config("engine", "none", "local modes need a vision engine"))?;
            engine.set_client_id(client_id);
            let status = engine.load(&self.inner.traits.user_agent).await?;
            if matches!(status, EngineStatus::Loaded { .. }) {
                let installed = match (mode, &card) {
                    (CaptureMode::LocalStitch, _) => engine.install_stitcher().await?,
                    (CaptureMode::CardScan, Some(params)) => engine.install_card_detector(params).await?,
                    _ => engine.install_document_detector().await?,
                };
                if let EngineOutcome::NotReady(capability) = installed {
                    warn!("[EVENT] capability_not_installed: {}", capability);
                }
            }
            status
        };

        let mut s = self.inner.session.lock().await;
        if mode == CaptureMode::CardScan {
            s.card = Some(CardSequencer::new(std::time::Duration::from_millis(
                self.inner.config.flip_delay_ms,
            )));
        }
        s.has_init = true;
        Ok(status)
    }

    /// Exchange a client id for a new session key and keep it.
    pub async fn create_new_session(&self, client_id: &str) -> LensResult<String> {
        let key = self.inner.validator.validate(client_id).await?;
        {
            let mut s = self.inner.session.lock().await;
            s.session_key = key.clone();
            s.client_id = client_id.to_string();
        }
        if let Some(remote) = self.inner.remote.lock().await.as_mut() {
            remote.set_session_key(key.clone());
        }
        Ok(key)
    }

    // ---- streaming ------------------------------------------------------

    /// Acquire the camera and start the tick loop.
    pub async fn start_camera(&self) -> LensResult<()> {
        let mode = {
            let s = self.inner.session.lock().await;
            if !s.has_init {
                return Err(LensError::state(format!("{:?}", s.state), "start_camera", "session is not initialised"));
            }
            if !s.mode.uses_camera() {
                return Err(LensError::state(format!("{:?}", s.mode), "start_camera", "mode has no camera"));
            }
            if s.state == LensState::Streaming {
                return Ok(());
            }
            s.mode
        };

        let constraints = CameraConstraints::for_mode(mode, self.inner.traits.is_desktop());
        let started = match self.inner.camera.lock().await.as_mut() {
            Some(camera) => camera.start_stream(&constraints).await,
            None => Err(LensError::camera("no camera configured")),
        };
        if let Err(e) = started {
            error!("[EVENT] camera_acquisition_failed: {}", e);
            let e = match e {
                e @ LensError::CameraAcquisition { .. } => e,
                other => LensError::camera(other.to_string()),
            };
            let mut s = self.inner.session.lock().await;
            s.state = LensState::Failed;
            s.record_error(LensError::camera(e.to_string()));
            return Err(e);
        }

        let engine_ready = if mode.uses_engine() {
            self.inner.engine.lock().await.as_ref().is_some_and(|e| e.is_loaded())
        } else {
            true
        };

        {
            let mut s = self.inner.session.lock().await;
            s.state = LensState::Streaming;
            s.next_generation();
            s.quadrilateral = Default::default();
            s.cropped = None;
            s.cropped_b64 = None;
        }
        info!("[EVENT] camera_started: mode={:?}", mode);

        if !engine_ready {
            warn!("[EVENT] engine_unavailable: frames will not be processed");
            return Ok(());
        }
        if self.inner.auto_tick {
            self.spawn_ticker().await;
        }
        Ok(())
    }

    /// Stop the tick loop and the camera. Safe to call repeatedly.
    pub async fn stop_camera(&self) -> LensResult<()> {
        self.halt(LensState::Stopped).await
    }

    /// Stop everything and move to `next` if currently streaming.
    pub(crate) async fn halt(&self, next: LensState) -> LensResult<()> {
        self.stop_ticker().await;
        let (mode, was_streaming) = {
            let mut s = self.inner.session.lock().await;
            let was_streaming = s.state == LensState::Streaming;
            if was_streaming {
                s.state = next;
            }
            s.next_generation();
            (s.mode, was_streaming)
        };

        if let Some(camera) = self.inner.camera.lock().await.as_mut() {
            if camera.is_streaming() {
                camera.stop_stream().await?;
                info!("[EVENT] camera_stopped");
            }
        }
        if was_streaming {
            if let Some(engine) = self.inner.engine.lock().await.as_mut() {
                engine.release_callback().await?;
            }
        }
        if mode == CaptureMode::RemoteSocket {
            if let Some(remote) = self.inner.remote.lock().await.as_mut() {
                if remote.is_connected() {
                    remote.close().await?;
                }
            }
        }
        Ok(())
    }

    /// Switch the stitcher from tracking to accumulating frames.
    pub async fn start_stitching(&self) {
        self.inner.session.lock().await.stitch_mode = StitchMode::Accumulate;
        info!("[EVENT] stitching_started");
    }

    /// Full teardown of streaming state and of everything drawn.
    pub async fn clean_canvases(&self) -> LensResult<()> {
        self.stop_camera().await?;
        self.inner.overlay.lock().await.release();
        self.inner.surface.lock().await.release();
        let mut s = self.inner.session.lock().await;
        s.quadrilateral = Default::default();
        s.cropped = None;
        s.cropped_b64 = None;
        s.full_frame = None;
        s.has_init = false;
        Ok(())
    }

    pub async fn toggle_torch(&self) -> LensResult<bool> {
        match self.inner.camera.lock().await.as_mut() {
            Some(camera) if camera.is_streaming() => camera.toggle_torch().await,
            _ => Err(LensError::state("not_streaming", "toggle_torch", "camera is not running")),
        }
    }

    // ---- accessors ------------------------------------------------------

    /// Current quadrilateral as `[x, y]` pairs, empty when none is known.
    pub async fn coordinates(&self) -> Vec<[f64; 2]> {
        self.inner.session.lock().await.quadrilateral.to_pairs()
    }

    pub async fn has_coordinates(&self) -> bool {
        self.inner.session.lock().await.has_coordinates()
    }

    /// Base64 JPEG of the last capture.
    pub async fn cropped_image(&self) -> Option<String> {
        self.inner.session.lock().await.cropped_b64.clone()
    }

    pub async fn blur_status(&self) -> Option<BlurStatus> {
        self.inner.session.lock().await.blur
    }

    pub async fn card_data(&self) -> Option<CardFields> {
        self.inner.session.lock().await.card.as_ref().map(|c| c.fields().clone())
    }

    pub async fn card_phase(&self) -> Option<CardPhase> {
        self.inner.session.lock().await.card.as_ref().map(|c| c.phase())
    }

    pub async fn lcd_status(&self) -> Option<LcdResult> {
        self.inner.engine.lock().await.as_ref().and_then(|e| e.lcd_status())
    }

    pub async fn engine_status(&self) -> Option<EngineStatus> {
        self.inner.engine.lock().await.as_ref().and_then(|e| e.status())
    }

    pub async fn device_data(&self) -> LensResult<DeviceData> {
        Ok(self.identity().await?.data())
    }

    pub async fn socket_status(&self) -> SocketStatus {
        self.inner
            .remote
            .lock()
            .await
            .as_ref()
            .map(|r| r.status())
            .unwrap_or(SocketStatus::Undefined)
    }

    pub async fn box_color(&self) -> String {
        self.inner.overlay.lock().await.color().to_css()
    }

    pub async fn set_box_color(&self, css: &str) -> LensResult<()> {
        let color = BoxColor::parse(css)
            .ok_or_else(|| LensError::validation("box_color", "CSS rgb/rgba/hex colour", css))?;
        self.inner.overlay.lock().await.set_color(color);
        Ok(())
    }

    pub async fn is_document(&self) -> bool {
        self.inner.session.lock().await.is_document
    }

    pub async fn session_key(&self) -> String {
        self.inner.session.lock().await.session_key.clone()
    }

    pub async fn set_session_key(&self, key: &str) {
        self.inner.session.lock().await.session_key = key.to_string();
        if let Some(remote) = self.inner.remote.lock().await.as_mut() {
            remote.set_session_key(key);
        }
    }

    pub async fn has_init(&self) -> bool {
        self.inner.session.lock().await.has_init
    }

    pub async fn state(&self) -> LensState {
        self.inner.session.lock().await.state
    }

    pub async fn mode(&self) -> CaptureMode {
        self.inner.session.lock().await.mode
    }

    pub async fn last_error(&self) -> Option<Arc<LensError>> {
        self.inner.session.lock().await.last_error.clone()
    }

    /// True while a detection call holds the admission permit.
    pub fn is_busy(&self) -> bool {
        self.inner.admission.available_permits() == 0
    }
}

fn epoch_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
