//! Pipeline error taxonomy and failure reporting.

use std::backtrace::Backtrace;
use std::error::Error as _;
use std::fmt;

use thiserror::Error;

use super::Stage;
use crate::capture::CameraError;
use crate::config::ConfigError;
use crate::job::{CleanupError, RequestError};
use crate::light::OutputError;
use crate::lock::LockError;
use crate::notify::NotifyError;
use crate::transcode::TranscodeError;

/// Everything that can end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Lock(#[from] LockError),

    #[error("{0}")]
    Output(#[from] OutputError),

    #[error("camera unavailable: {0}")]
    Device(#[source] CameraError),

    #[error("{0}")]
    HardwareUnavailable(String),

    #[error("capture failed: {0}")]
    Capture(#[source] CameraError),

    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] NotifyError),

    #[error("cleanup failed: {0}")]
    Cleanup(#[from] CleanupError),

    #[error("interrupted before {0}")]
    Interrupted(Stage),
}

impl From<CameraError> for PipelineError {
    fn from(e: CameraError) -> Self {
        if e.is_unavailable() {
            PipelineError::Device(e)
        } else {
            PipelineError::Capture(e)
        }
    }
}

/// User-facing classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Config,
    LockContention,
    HardwareUnavailable,
    Capture,
    Transcode,
    Delivery,
    Cleanup,
    Interrupted,
}

impl ErrorKind {
    /// Process exit code for this kind of failure.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidRequest | ErrorKind::Config => 2,
            ErrorKind::LockContention => 3,
            ErrorKind::HardwareUnavailable => 4,
            ErrorKind::Capture => 5,
            ErrorKind::Transcode => 6,
            ErrorKind::Delivery => 7,
            ErrorKind::Cleanup => 8,
            ErrorKind::Interrupted => 130,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Lock(LockError::Contention { .. }) => ErrorKind::LockContention,
            // An unusable lock directory is an environment problem.
            PipelineError::Lock(LockError::Io { .. }) => ErrorKind::Config,
            PipelineError::Output(_)
            | PipelineError::Device(_)
            | PipelineError::HardwareUnavailable(_) => ErrorKind::HardwareUnavailable,
            PipelineError::Capture(_) => ErrorKind::Capture,
            PipelineError::Transcode(_) => ErrorKind::Transcode,
            PipelineError::Delivery(_) => ErrorKind::Delivery,
            PipelineError::Cleanup(_) => ErrorKind::Cleanup,
            PipelineError::Interrupted(_) => ErrorKind::Interrupted,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

/// A [`PipelineError`] with the backtrace taken where it entered the
/// pipeline, before the run unwinds to its reporting code.
#[derive(Debug)]
pub(crate) struct Traced {
    pub(crate) error: PipelineError,
    pub(crate) backtrace: Backtrace,
}

impl<E: Into<PipelineError>> From<E> for Traced {
    fn from(e: E) -> Self {
        Self {
            error: e.into(),
            backtrace: Backtrace::force_capture(),
        }
    }
}

/// A failed run: the error, where it happened, and how far the run got.
#[derive(Debug)]
pub struct RunFailure {
    pub stage: Stage,
    pub error: PipelineError,
    pub stages: Vec<Stage>,
    backtrace: Backtrace,
}

impl RunFailure {
    /// A failure raised at the call site. Captures a backtrace only when
    /// `detailed` is set.
    pub fn new(stage: Stage, error: PipelineError, stages: Vec<Stage>, detailed: bool) -> Self {
        let backtrace = if detailed {
            Backtrace::force_capture()
        } else {
            Backtrace::disabled()
        };
        Self {
            stage,
            error,
            stages,
            backtrace,
        }
    }

    /// A failure that keeps the backtrace of the point where the error
    /// arose, when `detailed` is set.
    pub(crate) fn from_traced(
        stage: Stage,
        traced: Traced,
        stages: Vec<Stage>,
        detailed: bool,
    ) -> Self {
        Self {
            stage,
            error: traced.error,
            stages,
            backtrace: if detailed {
                traced.backtrace
            } else {
                Backtrace::disabled()
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }

    /// The message shown to the user.
    ///
    /// The short form is the error text and exit code; the detailed form
    /// adds the error kind, the failing stage, the source chain and the
    /// backtrace.
    pub fn render(&self, detailed: bool) -> String {
        if !detailed {
            return format!("error {}: {}", self.exit_code(), self.error);
        }

        let mut out = format!(
            "{} error during {} (exit {}): {}",
            self.kind(),
            self.stage,
            self.exit_code(),
            self.error
        );
        let mut source = self.error.source();
        while let Some(cause) = source {
            out.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }
        out.push_str(&format!("\n  detail: {:?}", self.error));
        let trail: Vec<String> = self.stages.iter().map(Stage::to_string).collect();
        out.push_str(&format!("\n  stages: {}", trail.join(" -> ")));
        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            out.push_str(&format!("\nstack backtrace:\n{}", self.backtrace));
        }
        out
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
