//! Scoped camera session.

use std::path::Path;
use std::time::Duration;

use super::{Camera, CameraConfig, CameraError};

/// An open camera that is closed when the session goes out of scope.
///
/// Opening and closing are paired on every exit path, including a
/// failed open and a panic during capture.
pub struct CameraSession<'a> {
    camera: &'a mut dyn Camera,
}

impl<'a> CameraSession<'a> {
    pub fn open(camera: &'a mut dyn Camera, config: &CameraConfig) -> Result<Self, CameraError> {
        if let Err(e) = camera.open(config) {
            camera.close();
            return Err(e);
        }
        tracing::debug!("Camera session opened");
        Ok(Self { camera })
    }

    pub fn capture_photo(&mut self, path: &Path) -> Result<(), CameraError> {
        tracing::info!(path = %path.display(), "Taking a photo");
        self.camera.capture_photo(path)
    }

    pub fn record_video(&mut self, path: &Path, duration: Duration) -> Result<(), CameraError> {
        tracing::info!(
            path = %path.display(),
            seconds = duration.as_secs_f64(),
            "Recording video"
        );
        self.camera.record_video(path, duration)
    }
}

impl Drop for CameraSession<'_> {
    fn drop(&mut self) {
        self.camera.close();
        tracing::debug!("Camera session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCamera;

    #[test]
    fn test_closed_after_scope() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = MockCamera::new();
        let probe = camera.clone();

        {
            let mut session = CameraSession::open(&mut camera, &CameraConfig::default()).unwrap();
            session.capture_photo(&dir.path().join("p.jpg")).unwrap();
            assert!(probe.state().is_open);
        }

        let state = probe.state();
        assert!(!state.is_open);
        assert_eq!(state.closes, 1);
    }

    #[test]
    fn test_closed_after_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = MockCamera::broken();
        let probe = camera.clone();

        let result = (|| -> Result<(), CameraError> {
            let mut session = CameraSession::open(&mut camera, &CameraConfig::default())?;
            session.record_video(&dir.path().join("v.h264"), Duration::from_secs(1))?;
            Ok(())
        })();

        assert!(matches!(result, Err(CameraError::CaptureFailed(_))));
        assert!(!probe.state().is_open);
    }

    #[test]
    fn test_failed_open() {
        let mut camera = MockCamera::unavailable();
        let result = CameraSession::open(&mut camera, &CameraConfig::default());
        assert!(matches!(result, Err(CameraError::DeviceNotFound(_))));
    }
}
