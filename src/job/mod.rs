//! Job description and capture artifacts.
//!
//! A [`JobRequest`] says what to capture and who receives it; a
//! [`CaptureArtifact`] is the file the run produced. The pipeline owns
//! every temporary artifact through [`TempArtifacts`].

mod artifact;
mod request;

pub use artifact::{ArtifactPaths, CaptureArtifact, CleanupError, TempArtifacts};
pub use request::{
    CaptureKind, DebugLevel, JobRequest, RequestError, DEFAULT_JOB_NAME, DEFAULT_VIDEO_DURATION,
    MAX_VIDEO_DURATION,
};
