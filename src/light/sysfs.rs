//! GPIO output through the Linux sysfs interface.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;

use super::output::{AuxOutput, OutputError};
use crate::config::LightConfig;

/// How long to wait for udev to create the line's attributes after export.
const EXPORT_POLL_ATTEMPTS: u32 = 20;
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A GPIO line driven through `/sys/class/gpio`.
#[derive(Debug, Clone)]
pub struct SysfsOutput {
    root: PathBuf,
    line: u32,
    active_low: bool,
    configured: bool,
}

impl SysfsOutput {
    pub fn new(root: impl Into<PathBuf>, line: u32, active_low: bool) -> Self {
        Self {
            root: root.into(),
            line,
            active_low,
            configured: false,
        }
    }

    pub fn from_config(config: &LightConfig) -> Self {
        Self::new(&config.sysfs_root, config.gpio_line, config.active_low)
    }

    fn line_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.line))
    }

    fn export(&self) -> Result<(), OutputError> {
        let export = self.root.join("export");
        match fs::write(&export, self.line.to_string()) {
            Ok(()) => {}
            // EBUSY: already exported by a previous run.
            Err(e) if e.raw_os_error() == Some(Errno::EBUSY as i32) => {}
            Err(e) => return Err(unavailable(&export, e)),
        }

        let direction = self.line_dir().join("direction");
        for _ in 0..EXPORT_POLL_ATTEMPTS {
            if direction.exists() {
                return Ok(());
            }
            thread::sleep(EXPORT_POLL_INTERVAL);
        }
        Err(OutputError::Unavailable(format!(
            "gpio{} did not appear under {}",
            self.line,
            self.root.display()
        )))
    }
}

impl AuxOutput for SysfsOutput {
    fn configure(&mut self) -> Result<(), OutputError> {
        if !self.line_dir().exists() {
            self.export()?;
        }

        let direction = self.line_dir().join("direction");
        fs::write(&direction, "out").map_err(|e| unavailable(&direction, e))?;

        self.configured = true;
        tracing::debug!(line = self.line, active_low = self.active_low, "GPIO line configured");
        Ok(())
    }

    fn set(&mut self, active: bool) -> Result<(), OutputError> {
        if !self.configured {
            return Err(OutputError::NotConfigured);
        }
        let high = active != self.active_low;
        let value = self.line_dir().join("value");
        fs::write(&value, if high { "1" } else { "0" })
            .map_err(|e| OutputError::SetFailed(format!("{}: {e}", value.display())))
    }
}

fn unavailable(path: &Path, e: io::Error) -> OutputError {
    OutputError::Unavailable(format!("{}: {e}", path.display()))
}
