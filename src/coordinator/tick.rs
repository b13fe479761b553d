//! The tick loop and in-flight dispatch.
//!
//! A tick never queues work. If the admission permit is taken the tick is
//! skipped and the frame it would have sampled is simply never captured.
//! Otherwise the frame is sampled, the permit moves into a spawned task
//! together with the frame, and the tick returns immediately.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::capture::SampledFrame;
use crate::card::{CardAction, CardPhase, CardSkip, CardTick};
use crate::coordinator::{CaptureCoordinator, Inner};
use crate::core::Quadrilateral;
use crate::engine::{Capability, CardDetection, DocumentDetection, EngineOutcome, StitchDetection, StitchMode};
use crate::error::{LensError, LensResult};
use crate::remote::RemoteReply;
use crate::session::{CaptureMode, LensState};

pub(crate) struct Ticker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Why a tick did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A detection call is still in flight.
    Busy,
    NotStreaming,
    /// The active mode has nothing to send frames to.
    NoTransport,
    /// Waiting for the card to be flipped.
    Flipping,
    /// The card scan is over.
    CardFinished,
}

/// What a tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Dispatched(InFlight),
}

impl TickOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, TickOutcome::Dispatched(_))
    }

    /// Wait for the dispatched call, if any.
    pub async fn settled(self) -> Option<DispatchOutcome> {
        match self {
            TickOutcome::Dispatched(in_flight) => Some(in_flight.settled().await),
            TickOutcome::Skipped(_) => None,
        }
    }
}

/// How an in-flight call ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    /// A boundary was found and is now the session's quadrilateral.
    DocumentFound(Quadrilateral),
    /// Nothing found; the quadrilateral and overlay were cleared.
    NoDocument,
    /// The reply carried nothing to act on.
    Ignored,
    /// The session moved on before the result arrived; it was dropped.
    Stale,
    /// The call stalled past the watchdog and its permit was released.
    TimedOut,
    Failed(String),
    /// The engine capability was not installed.
    NotReady(Capability),
    CardProgress { phase: CardPhase },
}

/// A dispatched detection call.
#[derive(Debug)]
pub struct InFlight {
    handle: JoinHandle<DispatchOutcome>,
    generation: u64,
}

impl InFlight {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn settled(self) -> DispatchOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => DispatchOutcome::Failed(e.to_string()),
        }
    }
}

/// Raw result of a dispatch, before it is applied to the session.
enum Detection {
    Remote(RemoteReply),
    Document(DocumentDetection),
    Stitch(StitchDetection),
    Card(CardDetection),
    NotReady(Capability),
}

impl<T> EngineOutcome<T> {
    fn into_detection(self, wrap: impl FnOnce(T) -> Detection) -> Detection {
        match self {
            EngineOutcome::Done(v) => wrap(v),
            EngineOutcome::NotReady(c) => Detection::NotReady(c),
        }
    }
}

impl CaptureCoordinator {
    /// Run one tick of the sampling loop.
    pub async fn tick(&self) -> LensResult<TickOutcome> {
        let Ok(permit) = self.inner.admission.clone().try_acquire_owned() else {
            return Ok(TickOutcome::Skipped(SkipReason::Busy));
        };

        let (mode, generation, stitch_mode) = {
            let mut s = self.inner.session.lock().await;
            if s.state != LensState::Streaming {
                return Ok(TickOutcome::Skipped(SkipReason::NotStreaming));
            }
            if let Some(card) = s.card.as_mut() {
                match card.on_tick(time::Instant::now().into_std()) {
                    CardTick::Process => {}
                    CardTick::Skip(CardSkip::Flipping) => return Ok(TickOutcome::Skipped(SkipReason::Flipping)),
                    CardTick::Skip(CardSkip::Finished) => {
                        return Ok(TickOutcome::Skipped(SkipReason::CardFinished));
                    }
                }
            }
            (s.mode, s.generation, s.stitch_mode)
        };

        let cap = match mode {
            CaptureMode::RemoteSocket => Some(self.inner.config.socket_max_shape),
            CaptureMode::UploadOnly => return Ok(TickOutcome::Skipped(SkipReason::NoTransport)),
            _ => self.inner.config.engine_max_shape,
        };

        let sample = {
            let mut camera = self.inner.camera.lock().await;
            let Some(camera) = camera.as_mut() else {
                return Ok(TickOutcome::Skipped(SkipReason::NoTransport));
            };
            let mut sampler = self.inner.sampler.lock().await;
            sampler.sample(&mut **camera, cap).await?
        };

        {
            let mut s = self.inner.session.lock().await;
            if s.generation != generation {
                return Ok(TickOutcome::Skipped(SkipReason::NotStreaming));
            }
            s.video_size = Some(sample.full.size());
            s.full_frame = Some(sample.full.clone());
            s.scale_factor = sample.scale_factor;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(run_in_flight(inner, permit, mode, stitch_mode, generation, sample));
        Ok(TickOutcome::Dispatched(InFlight { handle, generation }))
    }

    pub(crate) async fn spawn_ticker(&self) {
        let mut ticker_guard = self.inner.ticker.lock().await;
        if let Some(old) = ticker_guard.take() {
            old.cancel.cancel();
            old.handle.abort();
        }

        let cancel = CancellationToken::new();
        let cancel_token = cancel.clone();
        let this = self.clone();
        let period = Duration::from_millis(self.inner.config.interval_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match this.tick().await {
                            Ok(TickOutcome::Skipped(SkipReason::NotStreaming)) => break,
                            Ok(_) => {}
                            Err(e) => warn!("[EVENT] tick_failed: {}", e),
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        debug!("tick loop shutting down");
                        break;
                    }
                }
            }
        });
        *ticker_guard = Some(Ticker { cancel, handle });
        info!("[EVENT] tick_loop_started: every {} ms", period.as_millis());
    }

    pub(crate) async fn stop_ticker(&self) {
        if let Some(old) = self.inner.ticker.lock().await.take() {
            old.cancel.cancel();
            old.handle.abort();
        }
    }
}

async fn run_in_flight(
    inner: std::sync::Arc<Inner>,
    permit: OwnedSemaphorePermit,
    mode: CaptureMode,
    stitch_mode: StitchMode,
    generation: u64,
    sample: SampledFrame,
) -> DispatchOutcome {
    let outcome = settle_in_flight(&inner, mode, stitch_mode, generation, sample).await;
    // Admission reopens only once the result is fully applied.
    drop(permit);
    outcome
}

async fn settle_in_flight(
    inner: &Inner,
    mode: CaptureMode,
    stitch_mode: StitchMode,
    generation: u64,
    sample: SampledFrame,
) -> DispatchOutcome {
    let stall = Duration::from_millis(inner.config.transport_timeout_ms);
    let result = time::timeout(stall, dispatch(inner, mode, stitch_mode, &sample)).await;

    let detection = match result {
        Ok(Ok(detection)) => detection,
        Ok(Err(e)) => {
            warn!("[EVENT] dispatch_failed: {}", e);
            let message = e.to_string();
            inner.session.lock().await.record_error(e);
            return DispatchOutcome::Failed(message);
        }
        Err(_) => {
            error!("[EVENT] transport_stall: no reply within {} ms", stall.as_millis());
            let e = LensError::timeout("dispatch", stall.as_millis() as u64).with_context(format!("{:?}", mode));
            inner.session.lock().await.record_error(e);
            return DispatchOutcome::TimedOut;
        }
    };
    apply(inner, generation, sample.scale_factor, detection).await
}

async fn dispatch(
    inner: &Inner,
    mode: CaptureMode,
    stitch_mode: StitchMode,
    sample: &SampledFrame,
) -> LensResult<Detection> {
    if mode == CaptureMode::RemoteSocket {
        let payload = sample.detection.to_jpeg_base64(inner.config.jpeg_quality)?;
        let mut remote = inner.remote.lock().await;
        let client = remote
            .as_mut()
            .ok_or_else(|| LensError::state("no_transport", "dispatch", "remote mode has no crop transport"))?;
        return Ok(Detection::Remote(client.request(&payload).await?));
    }

    let mut engine = inner.engine.lock().await;
    let Some(engine) = engine.as_mut() else {
        return Ok(Detection::NotReady(Capability::Module));
    };
    let frame = &sample.detection;
    Ok(match mode {
        CaptureMode::LocalStitch => engine
            .stitch_frame(frame, stitch_mode)
            .await?
            .into_detection(Detection::Stitch),
        CaptureMode::CardScan => engine.process_card_frame(frame).await?.into_detection(Detection::Card),
        _ => engine.detect_document(frame).await?.into_detection(Detection::Document),
    })
}

/// Apply a detection to the session if it is still current.
async fn apply(inner: &Inner, generation: u64, scale_factor: f64, detection: Detection) -> DispatchOutcome {
    let video = {
        let s = inner.session.lock().await;
        if !s.is_current(generation) {
            debug!("[EVENT] stale_result dropped (generation {} != {})", generation, s.generation);
            return DispatchOutcome::Stale;
        }
        s.video_size
    };

    match detection {
        Detection::NotReady(capability) => {
            debug!("[EVENT] engine_not_ready: {}", capability);
            DispatchOutcome::NotReady(capability)
        }
        Detection::Remote(RemoteReply::Connected) | Detection::Remote(RemoteReply::Ignored(_)) => {
            DispatchOutcome::Ignored
        }
        Detection::Remote(RemoteReply::NotDocument) => clear_document(inner, generation).await,
        Detection::Remote(RemoteReply::Contours(quad)) => {
            show_document(inner, generation, quad.to_display(scale_factor), video).await
        }
        Detection::Document(det) => match det.quadrilateral() {
            Some(quad) => show_document(inner, generation, quad.to_display(scale_factor), video).await,
            None => clear_document(inner, generation).await,
        },
        Detection::Stitch(det) => {
            if det.should_update_preview() {
                if let Some(preview) = &det.preview {
                    let target = inner.surface.lock().await.preview_size();
                    match inner.preview.lock().await.fit(preview, target) {
                        Ok(fitted) => inner.surface.lock().await.present_preview(&fitted),
                        Err(e) => warn!("[EVENT] preview_resize_failed: {}", e),
                    }
                }
            }
            match det.quadrilateral() {
                Some(quad) => show_document(inner, generation, quad.to_display(scale_factor), video).await,
                None => clear_document(inner, generation).await,
            }
        }
        Detection::Card(det) => apply_card(inner, generation, det).await,
    }
}

async fn show_document(
    inner: &Inner,
    generation: u64,
    quad: Quadrilateral,
    video: Option<crate::core::Size>,
) -> DispatchOutcome {
    {
        let mut s = inner.session.lock().await;
        if !s.is_current(generation) {
            return DispatchOutcome::Stale;
        }
        s.quadrilateral = quad.clone();
    }
    if let Some(video) = video {
        let mut overlay = inner.overlay.lock().await;
        let canvas = overlay.draw(&quad, video);
        inner.surface.lock().await.present_overlay(canvas);
    }
    DispatchOutcome::DocumentFound(quad)
}

async fn clear_document(inner: &Inner, generation: u64) -> DispatchOutcome {
    {
        let mut s = inner.session.lock().await;
        if !s.is_current(generation) {
            return DispatchOutcome::Stale;
        }
        s.quadrilateral = Quadrilateral::empty();
    }
    let mut overlay = inner.overlay.lock().await;
    let canvas = overlay.erase();
    inner.surface.lock().await.present_overlay(canvas);
    DispatchOutcome::NoDocument
}

async fn apply_card(inner: &Inner, generation: u64, detection: CardDetection) -> DispatchOutcome {
    let (actions, phase) = {
        let mut s = inner.session.lock().await;
        if !s.is_current(generation) {
            return DispatchOutcome::Stale;
        }
        let Some(card) = s.card.as_mut() else {
            return DispatchOutcome::Ignored;
        };
        let actions = card.on_detection(&detection, time::Instant::now().into_std());
        (actions, card.phase())
    };

    if !actions.is_empty() {
        let mut engine = inner.engine.lock().await;
        if let Some(engine) = engine.as_mut() {
            for action in actions {
                let result = match action {
                    CardAction::ResetAutoCapture(targets) => engine.reset_auto_capture(targets).await.map(|_| ()),
                    CardAction::ReleaseCallback => engine.release_callback().await,
                };
                if let Err(e) = result {
                    warn!("[EVENT] card_action_failed: {:?}: {}", action, e);
                }
            }
        }
    }
    if phase == CardPhase::Done {
        info!("[EVENT] card_scan_complete");
    }
    DispatchOutcome::CardProgress { phase }
}
