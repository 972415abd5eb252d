//! Camera capture configuration.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Settings handed to [`Camera::open`](super::Camera::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Still-capture program (libcamera CLI).
    pub still_program: String,
    /// Video-capture program (libcamera CLI).
    pub video_program: String,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Video frame rate.
    pub framerate: u32,
    /// Time the sensor gets to settle exposure before a still, in ms.
    pub warmup_ms: u64,
    /// Extra seconds a recording may overrun before it is killed.
    pub stop_grace_secs: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            still_program: "rpicam-still".to_string(),
            video_program: "rpicam-vid".to_string(),
            width: 1920,
            height: 1080,
            framerate: 30,
            warmup_ms: 500,
            stop_grace_secs: 10,
        }
    }
}

impl CameraConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("camera: invalid frame dimensions".into()));
        }
        if self.framerate == 0 || self.framerate > 120 {
            return Err(ConfigError::Invalid(
                "camera: invalid frame rate (must be 1-120 fps)".into(),
            ));
        }
        if self.still_program.trim().is_empty() || self.video_program.trim().is_empty() {
            return Err(ConfigError::Invalid("camera: capture program not set".into()));
        }
        Ok(())
    }
}
