//! Auxiliary output abstraction and the scope guard that pairs on/off.

use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Errors that can occur while driving the auxiliary output.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("auxiliary output unavailable: {0}")]
    Unavailable(String),
    #[error("auxiliary output used before configure()")]
    NotConfigured,
    #[error("failed to set auxiliary output level: {0}")]
    SetFailed(String),
}

/// A binary output line, such as a relay driving a light.
///
/// Level changes are not read back; the hardware layer is trusted.
pub trait AuxOutput {
    /// Prepares the line for output. Must succeed when repeated.
    fn configure(&mut self) -> Result<(), OutputError>;

    /// Drives the output to its active (`true`) or idle level.
    fn set(&mut self, active: bool) -> Result<(), OutputError>;

    fn on(&mut self) -> Result<(), OutputError> {
        self.set(true)
    }

    fn off(&mut self) -> Result<(), OutputError> {
        self.set(false)
    }
}

/// Keeps the output active while in scope.
///
/// [`LightGuard::switch_off`] reports the result of turning the output
/// off; if the guard is dropped instead (early return, panic) the output
/// is still turned off and any error is logged.
pub struct LightGuard<'a> {
    output: &'a mut dyn AuxOutput,
    active: bool,
}

impl<'a> LightGuard<'a> {
    /// Turns the output on and returns the guard that will turn it off.
    pub fn switch_on(output: &'a mut dyn AuxOutput) -> Result<Self, OutputError> {
        output.on()?;
        tracing::info!("Auxiliary output on");
        Ok(Self {
            output,
            active: true,
        })
    }

    /// Turns the output off now.
    pub fn switch_off(mut self) -> Result<(), OutputError> {
        self.active = false;
        let result = self.output.off();
        if result.is_ok() {
            tracing::info!("Auxiliary output off");
        }
        result
    }
}

impl Drop for LightGuard<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        match self.output.off() {
            Ok(()) => tracing::info!("Auxiliary output off (unwind)"),
            Err(e) => tracing::error!(error = %e, "Failed to turn auxiliary output off"),
        }
    }
}

/// Observable state of a [`MockOutput`].
#[derive(Debug, Default, Clone)]
pub struct MockOutputState {
    pub configured: usize,
    pub active: bool,
    /// Every level written, in order.
    pub levels: Vec<bool>,
}

/// In-memory output for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct MockOutput {
    state: Arc<Mutex<MockOutputState>>,
    fail_configure: bool,
    fail_on: bool,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// An output whose `configure()` always fails.
    pub fn unavailable() -> Self {
        Self {
            fail_configure: true,
            ..Self::default()
        }
    }

    /// An output that configures but cannot be switched on.
    pub fn stuck_off() -> Self {
        Self {
            fail_on: true,
            ..Self::default()
        }
    }

    /// Snapshot of the recorded state.
    pub fn state(&self) -> MockOutputState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl AuxOutput for MockOutput {
    fn configure(&mut self) -> Result<(), OutputError> {
        if self.fail_configure {
            return Err(OutputError::Unavailable("mock output disabled".into()));
        }
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.configured += 1;
        Ok(())
    }

    fn set(&mut self, active: bool) -> Result<(), OutputError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if state.configured == 0 {
            return Err(OutputError::NotConfigured);
        }
        if active && self.fail_on {
            return Err(OutputError::SetFailed("mock output stuck".into()));
        }
        state.active = active;
        state.levels.push(active);
        Ok(())
    }
}
