//! # Document Lens
//!
//! A camera capture pipeline that finds documents in a live feed, outlines
//! them with a translucent overlay, and crops them on request.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `coordinator`: the capture state machine driving the tick loop
//! - `engine`: typed facade over the opaque vision module
//! - `remote`: crop socket protocol and request/response client
//! - `card`: front/flip/back sequencing for payment cards
//! - `capture`: camera collaborator and frame sampling
//! - `processing`: overlay rendering, stitch preview and display surface
//! - `identity`: device fingerprinting and partner session validation
//! - `core`: frames and geometry
//! - `config`: configuration and validation
//! - `session`: the state of one capture session
//!
//! ## Capture Modes
//!
//! - **Remote**: frames are downscaled to 512 px and sent to a server-side cropper
//! - **Local document**: single-frame detection in the local engine
//! - **Local stitch**: multi-frame panorama for long receipts
//! - **Card**: field-by-field payment card capture
//! - **Upload only**: detection on images supplied by the host
//!
//! ## Example
//!
//! ```rust,no_run
//! use doc_lens::{CaptureCoordinator, LensConfig};
//!
//! # async fn example(engine: Box<dyn doc_lens::engine::VisionEngine>, camera: Box<dyn doc_lens::capture::Camera>) -> doc_lens::LensResult<()> {
//! let lens = CaptureCoordinator::builder()
//!     .with_config(LensConfig::default())
//!     .with_engine(engine)
//!     .with_camera(camera)
//!     .build()?;
//!
//! lens.init_document(None, "client-id").await?;
//! lens.start_camera().await?;
//! let image = lens.capture_document().await?;
//! println!("{} bytes of base64 JPEG", image.len());
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod card;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod engine;
pub mod error;
pub mod identity;
pub mod processing;
pub mod remote;
pub mod session;

/// Re-export error types for convenience
pub use error::{HasRecoverySuggestion, HasSeverity, LensError, LensResult, Retryable};

pub use config::LensConfig;
pub use coordinator::{CaptureCoordinator, CaptureCoordinatorBuilder, DispatchOutcome, SkipReason, TickOutcome};
pub use session::{BlurStatus, CaptureMode, LensState};
