//! Camera access.
//!
//! This module provides the [`Camera`] abstraction, a scoped
//! [`CameraSession`] that guarantees the device is released, and the
//! backends: the libcamera CLI tools and an in-process mock.

mod camera;
mod config;
mod rpicam;
mod session;

pub use camera::{Camera, CameraError, MockCamera, MockCameraState};
pub use config::CameraConfig;
pub use rpicam::RpiCamera;
pub use session::CameraSession;
