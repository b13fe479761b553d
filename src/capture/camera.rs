//! Camera collaborator.
//!
//! Device selection, permissions and track handling belong to the host; the
//! coordinator only starts and stops the stream, grabs the current frame and
//! toggles the torch.

use async_trait::async_trait;

use crate::core::{RgbaFrame, Size};
use crate::error::LensResult;
use crate::session::CaptureMode;

/// Which way the camera faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Stream request handed to the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    /// Ideal resolution, width by height.
    pub ideal: Size,
    /// Requested aspect ratio, width over height.
    pub aspect_ratio: f64,
}

impl CameraConstraints {
    /// Constraints for a capture mode. Desktop hosts (screen wider than tall)
    /// ask for a portrait aspect.
    pub fn for_mode(mode: CaptureMode, is_desktop: bool) -> Self {
        let ideal = match mode {
            CaptureMode::LocalStitch | CaptureMode::CardScan => Size { w: 1080, h: 1920 },
            CaptureMode::RemoteSocket | CaptureMode::LocalDocument | CaptureMode::UploadOnly => {
                Size { w: 2160, h: 4096 }
            }
        };
        Self {
            facing: FacingMode::Environment,
            ideal,
            aspect_ratio: if is_desktop { 9.0 / 16.0 } else { 16.0 / 9.0 },
        }
    }
}

/// Live camera feed.
#[async_trait]
pub trait Camera: Send {
    /// Acquire the camera and start streaming.
    ///
    /// # Returns
    ///
    /// An error when the device cannot be acquired (permission denied, no
    /// device, device busy).
    async fn start_stream(&mut self, constraints: &CameraConstraints) -> LensResult<()>;

    /// Stop every track. Stopping a stopped stream is a no-op.
    async fn stop_stream(&mut self) -> LensResult<()>;

    /// Flip the torch.
    ///
    /// # Returns
    ///
    /// The new torch state.
    async fn toggle_torch(&mut self) -> LensResult<bool>;

    /// The current video frame at full resolution.
    async fn grab_frame(&mut self) -> LensResult<RgbaFrame>;

    /// Current video dimensions; they may change between frames.
    fn video_size(&self) -> Option<Size>;

    fn is_streaming(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraints_per_mode() {
        let remote = CameraConstraints::for_mode(CaptureMode::RemoteSocket, false);
        assert_eq!(remote.ideal, Size { w: 2160, h: 4096 });
        assert_eq!(remote.facing, FacingMode::Environment);
        assert!((remote.aspect_ratio - 16.0 / 9.0).abs() < 1e-12);

        let stitch = CameraConstraints::for_mode(CaptureMode::LocalStitch, true);
        assert_eq!(stitch.ideal, Size { w: 1080, h: 1920 });
        assert!((stitch.aspect_ratio - 9.0 / 16.0).abs() < 1e-12);
    }
}
