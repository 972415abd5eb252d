//! Camera abstraction for still and video capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::CameraConfig;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture: {0}")]
    CaptureFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

impl CameraError {
    /// True when the device could not be acquired at all, as opposed to
    /// a failure during capture.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            CameraError::DeviceNotFound(_) | CameraError::OpenFailed(_) | CameraError::ConfigFailed(_)
        )
    }
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and mock implementations for testing.
pub trait Camera {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CameraConfig) -> Result<(), CameraError>;

    /// Writes a single still image to `path`.
    fn capture_photo(&mut self, path: &Path) -> Result<(), CameraError>;

    /// Records video to `path`, stopping once `duration` has elapsed.
    fn record_video(&mut self, path: &Path, duration: Duration) -> Result<(), CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources. Safe to call repeatedly.
    fn close(&mut self);
}

/// What a [`MockCamera`] has been asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockCameraState {
    pub opens: usize,
    pub closes: usize,
    pub is_open: bool,
    pub photos: Vec<PathBuf>,
    pub videos: Vec<(PathBuf, Duration)>,
}

/// Mock camera for testing that writes small placeholder files.
///
/// Recording returns immediately instead of blocking for the duration.
#[derive(Debug, Clone, Default)]
pub struct MockCamera {
    state: Arc<Mutex<MockCameraState>>,
    fail_open: bool,
    fail_capture: bool,
}

/// JPEG start/end-of-image markers.
const PLACEHOLDER_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xD9];
/// H.264 Annex B start code.
const PLACEHOLDER_H264: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x67];

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera that cannot be opened.
    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// A camera that opens but fails every capture after writing a
    /// partial file.
    pub fn broken() -> Self {
        Self {
            fail_capture: true,
            ..Self::default()
        }
    }

    /// Snapshot of the recorded state.
    pub fn state(&self) -> MockCameraState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), CameraError> {
        std::fs::write(path, bytes).map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        if self.fail_capture {
            return Err(CameraError::CaptureFailed("mock sensor fault".into()));
        }
        Ok(())
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        if self.fail_open {
            return Err(CameraError::DeviceNotFound("mock camera disabled".into()));
        }
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.opens += 1;
        state.is_open = true;
        tracing::info!(width = config.width, height = config.height, "MockCamera opened");
        Ok(())
    }

    fn capture_photo(&mut self, path: &Path) -> Result<(), CameraError> {
        if !self.is_open() {
            return Err(CameraError::NotInitialized);
        }
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .photos
            .push(path.to_path_buf());
        self.write(path, PLACEHOLDER_JPEG)
    }

    fn record_video(&mut self, path: &Path, duration: Duration) -> Result<(), CameraError> {
        if !self.is_open() {
            return Err(CameraError::NotInitialized);
        }
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .videos
            .push((path.to_path_buf(), duration));
        self.write(path, PLACEHOLDER_H264)
    }

    fn is_open(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.is_open)
            .unwrap_or(false)
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.is_open {
            state.is_open = false;
            state.closes += 1;
            tracing::info!("MockCamera closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_camera_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = MockCamera::new();
        let config = CameraConfig::default();

        assert!(!camera.is_open());

        camera.open(&config).unwrap();
        assert!(camera.is_open());

        let photo = dir.path().join("a.jpg");
        camera.capture_photo(&photo).unwrap();
        assert!(photo.exists());

        let clip = dir.path().join("a.h264");
        camera.record_video(&clip, Duration::from_secs(5)).unwrap();
        assert!(clip.exists());

        camera.close();
        camera.close();
        assert!(!camera.is_open());

        let state = camera.state();
        assert_eq!(state.opens, 1);
        assert_eq!(state.closes, 1);
        assert_eq!(state.videos, vec![(clip, Duration::from_secs(5))]);
    }

    #[test]
    fn test_capture_without_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = MockCamera::new();
        assert!(matches!(
            camera.capture_photo(&dir.path().join("x.jpg")),
            Err(CameraError::NotInitialized)
        ));
    }

    #[test]
    fn test_error_classification() {
        assert!(CameraError::DeviceNotFound("x".into()).is_unavailable());
        assert!(CameraError::OpenFailed("x".into()).is_unavailable());
        assert!(!CameraError::CaptureFailed("x".into()).is_unavailable());
        assert!(!CameraError::NotInitialized.is_unavailable());
    }
}
