//! Snapmail Library
//!
//! Takes a single photo or short video on a Raspberry Pi camera, optionally
//! with a relay-driven light switched on for the capture, and delivers the
//! result by e-mail (and, for photos, a Pushover notification).
//!
//! # Architecture
//!
//! One job per process, run as an explicit state machine:
//!
//! ```text
//! lock → light on → capture → light off → transcode → notify → cleanup
//!                                         (video)
//! ```
//!
//! # Design Principles
//!
//! - **One run at a time**: a per-job file lock; a second instance fails fast
//! - **Structural release**: lock, light, camera and temp files are held by
//!   guards, so every exit path releases them
//! - **Swappable edges**: camera, light, transcoder and transports are traits
//!   with in-process mocks
//!
//! # Example
//!
//! ```no_run
//! use snapmail::{
//!     capture::MockCamera,
//!     config::Settings,
//!     job::{CaptureKind, JobRequest},
//!     light::MockOutput,
//!     notify::{Notifier, RecordingChannel},
//!     pipeline::{Collaborators, Pipeline, PipelineSettings},
//!     transcode::MockTranscoder,
//! };
//!
//! let settings = Settings::default();
//! let request = JobRequest::new(CaptureKind::Video, "me@example.com").with_light(true);
//!
//! let parts = Collaborators {
//!     camera: Box::new(MockCamera::new()),
//!     light: Some(Box::new(MockOutput::new())),
//!     transcoder: Box::new(MockTranscoder::new()),
//!     notifier: Notifier::new(Box::new(RecordingChannel::new())),
//! };
//!
//! let pipeline = Pipeline::new(request, PipelineSettings::from(&settings), parts).unwrap();
//! match pipeline.run() {
//!     Ok(report) => println!("sent {}", report.artifact.display()),
//!     Err(failure) => eprintln!("{}", failure.render(false)),
//! }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod job;
pub mod light;
pub mod lock;
pub mod notify;
pub mod pipeline;
pub mod transcode;

// Re-export commonly used types at crate root
pub use capture::{Camera, CameraConfig, MockCamera, RpiCamera};
pub use config::{ConfigError, Settings};
pub use job::{CaptureKind, DebugLevel, JobRequest};
pub use light::{AuxOutput, MockOutput, SysfsOutput};
pub use notify::{Notifier, PushoverClient, SmtpMailer};
pub use pipeline::{ErrorKind, Pipeline, PipelineError, RunFailure, RunReport};
pub use transcode::{Mp4BoxTranscoder, Transcoder};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
