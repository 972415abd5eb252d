//! Raspberry Pi camera driven through the libcamera command-line tools.
//!
//! `rpicam-still` and `rpicam-vid` own the sensor for as long as they run,
//! so "opening" the camera only verifies that a sensor is attached and
//! the tools are callable. Each capture is one subprocess.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{Camera, CameraConfig, CameraError};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Camera backed by `rpicam-still` / `rpicam-vid`.
#[derive(Debug, Default)]
pub struct RpiCamera {
    config: Option<CameraConfig>,
}

impl RpiCamera {
    pub fn new() -> Self {
        Self::default()
    }

    fn config(&self) -> Result<&CameraConfig, CameraError> {
        self.config.as_ref().ok_or(CameraError::NotInitialized)
    }
}

impl Camera for RpiCamera {
    fn open(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let output = Command::new(&config.still_program)
            .arg("--list-cameras")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CameraError::OpenFailed(format!("{}: {e}", config.still_program)))?;

        let listing = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || listing.contains("No cameras available") {
            return Err(CameraError::DeviceNotFound(format!(
                "{} --list-cameras reported no camera",
                config.still_program
            )));
        }

        tracing::info!(
            width = config.width,
            height = config.height,
            "Raspberry Pi camera available"
        );
        self.config = Some(config.clone());
        Ok(())
    }

    fn capture_photo(&mut self, path: &Path) -> Result<(), CameraError> {
        let config = self.config()?;
        let output = Command::new(&config.still_program)
            .args(["--nopreview", "--timeout"])
            .arg(config.warmup_ms.max(1).to_string())
            .arg("--width")
            .arg(config.width.to_string())
            .arg("--height")
            .arg(config.height.to_string())
            .arg("--output")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", config.still_program)))?;

        if !output.status.success() {
            return Err(CameraError::CaptureFailed(format!(
                "{} exited with {}: {}",
                config.still_program,
                output.status,
                last_line(&output.stderr)
            )));
        }
        Ok(())
    }

    fn record_video(&mut self, path: &Path, duration: Duration) -> Result<(), CameraError> {
        let config = self.config()?;
        let millis = duration.as_millis().max(1);
        let stop_after = duration
            .checked_add(Duration::from_secs(config.stop_grace_secs))
            .and_then(|limit| Instant::now().checked_add(limit))
            .ok_or_else(|| {
                CameraError::ConfigFailed(format!("recording length {duration:?} is out of range"))
            })?;

        let mut child = Command::new(&config.video_program)
            .args(["--nopreview", "--codec", "h264", "--timeout"])
            .arg(millis.to_string())
            .arg("--width")
            .arg(config.width.to_string())
            .arg("--height")
            .arg(config.height.to_string())
            .arg("--framerate")
            .arg(config.framerate.to_string())
            .arg("--output")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", config.video_program)))?;

        // The tool stops itself at --timeout; the deadline only covers a hung process.
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= stop_after => {
                    tracing::warn!(program = %config.video_program, "Recording overran, stopping it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CameraError::CaptureFailed(format!(
                        "{} did not stop after {:?}",
                        config.video_program, duration
                    )));
                }
                Ok(None) => thread::sleep(WAIT_POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(CameraError::CaptureFailed(e.to_string()));
                }
            }
        };

        if !status.success() {
            return Err(CameraError::CaptureFailed(format!(
                "{} exited with {status}",
                config.video_program
            )));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        if self.config.take().is_some() {
            tracing::debug!("Raspberry Pi camera released");
        }
    }
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no diagnostic output")
        .trim()
        .to_string()
}
