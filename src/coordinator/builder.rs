//! Fluent construction of a [`CaptureCoordinator`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};

use crate::capture::{Camera, FrameSampler};
use crate::config::LensConfig;
use crate::coordinator::{CaptureCoordinator, Inner};
use crate::engine::{EngineClient, VisionEngine};
use crate::error::{LensError, LensResult};
use crate::identity::{DeviceTraits, Fingerprinter, HttpSessionValidator, SessionValidator, TraitsFingerprinter};
use crate::processing::{NullSurface, OverlayRenderer, PreviewScaler, Surface};
use crate::remote::{CropTransport, RemoteCropClient};
use crate::session::{CaptureMode, CaptureSession};

/// Builder for a coordinator and its collaborators.
pub struct CaptureCoordinatorBuilder {
    config: LensConfig,
    traits: DeviceTraits,
    camera: Option<Box<dyn Camera>>,
    engine: Option<Box<dyn VisionEngine>>,
    transport: Option<Box<dyn CropTransport>>,
    surface: Option<Box<dyn Surface>>,
    validator: Option<Arc<dyn SessionValidator>>,
    fingerprinter: Option<Arc<dyn Fingerprinter>>,
    auto_tick: bool,
}

impl Default for CaptureCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            config: LensConfig::default(),
            traits: DeviceTraits::default(),
            camera: None,
            engine: None,
            transport: None,
            surface: None,
            validator: None,
            fingerprinter: None,
            auto_tick: true,
        }
    }

    pub fn with_config(mut self, config: LensConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_device_traits(mut self, traits: DeviceTraits) -> Self {
        self.traits = traits;
        self
    }

    pub fn with_camera(mut self, camera: Box<dyn Camera>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_engine(mut self, engine: Box<dyn VisionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_transport(mut self, transport: Box<dyn CropTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_surface(mut self, surface: Box<dyn Surface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SessionValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = Some(fingerprinter);
        self
    }

    /// Do not spawn the tick loop; the host calls
    /// [`CaptureCoordinator::tick`] itself.
    pub fn manual_ticks(mut self) -> Self {
        self.auto_tick = false;
        self
    }

    pub fn build(self) -> LensResult<CaptureCoordinator> {
        self.config
            .validate()
            .map_err(|reason| LensError::config("lens_config", format!("{:?}", self.config), reason))?;

        let validator = self.validator.unwrap_or_else(|| {
            Arc::new(HttpSessionValidator::new(
                self.config.validate_url.clone(),
                Duration::from_millis(self.config.transport_timeout_ms),
            ))
        });
        let engine = self
            .engine
            .map(|engine| EngineClient::new(engine, String::new(), self.config.lcd_interval));
        let remote = self
            .transport
            .map(|transport| RemoteCropClient::new(transport, String::new(), String::new()));
        let overlay = OverlayRenderer::new(self.config.parsed_box_color(), self.config.overlay_shape);

        let inner = Inner {
            traits: self.traits,
            session: Mutex::new(CaptureSession::new(CaptureMode::RemoteSocket)),
            camera: Mutex::new(self.camera),
            engine: Mutex::new(engine),
            remote: Mutex::new(remote),
            surface: Mutex::new(self.surface.unwrap_or_else(|| Box::new(NullSurface))),
            overlay: Mutex::new(overlay),
            preview: Mutex::new(PreviewScaler::new()),
            sampler: Mutex::new(FrameSampler::new()),
            validator,
            fingerprinter: self.fingerprinter.unwrap_or_else(|| Arc::new(TraitsFingerprinter)),
            admission: Arc::new(Semaphore::new(1)),
            ticker: Mutex::new(None),
            auto_tick: self.auto_tick,
            config: self.config,
        };
        Ok(CaptureCoordinator { inner: Arc::new(inner) })
    }
}
