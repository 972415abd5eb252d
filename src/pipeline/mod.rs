//! The capture-and-notify state machine.
//!
//! A run takes the job lock, optionally switches the light on, captures,
//! switches the light off, transcodes video, delivers the result and
//! removes its temp files. Every acquired resource is held by a guard so
//! that it is released on any exit path:
//!
//! - [`RunLockHandle`](crate::lock::RunLockHandle) for the job lock
//! - [`LightGuard`] for the auxiliary output
//! - [`CameraSession`] for the camera
//! - [`TempArtifacts`] for files written during the run

mod error;
mod stage;

pub use error::{ErrorKind, PipelineError, RunFailure};

use error::Traced;
pub use stage::{Stage, StageTrail};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::capture::{Camera, CameraConfig, CameraError, CameraSession};
use crate::config::Settings;
use crate::job::{ArtifactPaths, CaptureArtifact, CaptureKind, JobRequest, TempArtifacts};
use crate::light::{AuxOutput, LightGuard};
use crate::lock::RunLock;
use crate::notify::{NotificationResult, Notifier};
use crate::transcode::Transcoder;

/// The parts of [`Settings`] the pipeline itself reads.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub temp_dir: PathBuf,
    pub lock_dir: PathBuf,
    pub camera: CameraConfig,
}

impl From<&Settings> for PipelineSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            temp_dir: settings.paths.temp_dir.clone(),
            lock_dir: settings.paths.lock_dir.clone(),
            camera: settings.camera.clone(),
        }
    }
}

/// Devices and transports a run drives.
pub struct Collaborators {
    pub camera: Box<dyn Camera>,
    /// Required only when the request enables the light.
    pub light: Option<Box<dyn AuxOutput>>,
    pub transcoder: Box<dyn Transcoder>,
    pub notifier: Notifier,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunReport {
    pub kind: CaptureKind,
    /// The delivered file. It no longer exists once the run has finished.
    pub artifact: PathBuf,
    pub notifications: Vec<NotificationResult>,
    pub stages: Vec<Stage>,
}

impl RunReport {
    /// Channels that failed without failing the run.
    pub fn failed_channels(&self) -> impl Iterator<Item = &NotificationResult> {
        self.notifications.iter().filter(|n| !n.success)
    }
}

/// One capture-and-notify job.
pub struct Pipeline {
    request: JobRequest,
    settings: PipelineSettings,
    parts: Collaborators,
    interrupt: Arc<AtomicBool>,
    stages: StageTrail,
}

impl Pipeline {
    /// Validates the request and prepares a run. Nothing is touched yet.
    pub fn new(
        request: JobRequest,
        settings: PipelineSettings,
        parts: Collaborators,
    ) -> Result<Self, RunFailure> {
        if let Err(e) = request.validate() {
            let detailed = request.debug_level.is_enabled();
            return Err(RunFailure::new(
                Stage::Idle,
                e.into(),
                vec![Stage::Idle],
                detailed,
            ));
        }
        Ok(Self {
            request,
            settings,
            parts,
            interrupt: Arc::new(AtomicBool::new(false)),
            stages: StageTrail::new(),
        })
    }

    /// Shares a flag that, once raised, stops the run at the next stage
    /// boundary.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Runs the job to completion.
    pub fn run(mut self) -> Result<RunReport, RunFailure> {
        tracing::info!(
            job = %self.request.job_name,
            kind = %self.request.capture_kind,
            light = self.request.aux_output_enabled,
            push = self.request.wants_push(),
            "Starting capture job"
        );

        match self.execute() {
            Ok((artifact, notifications)) => {
                self.stages.enter(Stage::Done);
                tracing::info!(
                    job = %self.request.job_name,
                    delivered = notifications.iter().filter(|n| n.success).count(),
                    "Capture job complete"
                );
                Ok(RunReport {
                    kind: artifact.kind,
                    artifact: artifact.path,
                    notifications,
                    stages: self.stages.into_vec(),
                })
            }
            Err(traced) => {
                let error = &traced.error;
                // Capture errors surface after the light is off, delivery
                // errors after cleanup.
                let stage = match error {
                    PipelineError::Capture(_) | PipelineError::Device(_) => Stage::Capturing,
                    PipelineError::Delivery(_) => Stage::Notifying,
                    _ => self.stages.current(),
                };
                self.stages.enter(Stage::Failed);
                tracing::error!(
                    job = %self.request.job_name,
                    %stage,
                    kind = %error.kind(),
                    error = %error,
                    "Capture job failed"
                );
                Err(RunFailure::from_traced(
                    stage,
                    traced,
                    self.stages.into_vec(),
                    self.request.debug_level.is_enabled(),
                ))
            }
        }
    }

    /// Guards are dropped before this returns, so every resource is
    /// released by the time `run` records the outcome.
    fn execute(&mut self) -> Result<(CaptureArtifact, Vec<NotificationResult>), Traced> {
        let kind = self.request.capture_kind;

        let _lock = RunLock::acquire(&self.settings.lock_dir, &self.request.job_name)?;
        self.stages.enter(Stage::LockAcquired);

        let paths = ArtifactPaths::for_job(&self.settings.temp_dir, &self.request.job_name);
        TempArtifacts::clear_stale(paths.for_kind(kind));
        let mut temps = TempArtifacts::new();

        let light = if self.request.aux_output_enabled {
            check_interrupt(&self.interrupt, Stage::AuxOn)?;
            let output = self.parts.light.as_deref_mut().ok_or_else(|| {
                PipelineError::HardwareUnavailable(
                    "light requested but no auxiliary output is configured".to_string(),
                )
            })?;
            output.configure()?;
            let guard = LightGuard::switch_on(output)?;
            self.stages.enter(Stage::AuxOn);
            Some(guard)
        } else {
            None
        };

        check_interrupt(&self.interrupt, Stage::Capturing)?;
        self.stages.enter(Stage::Capturing);
        let target = match kind {
            CaptureKind::Photo => &paths.photo,
            CaptureKind::Video => &paths.raw_video,
        };
        temps.track(target);
        let captured = capture_into(
            self.parts.camera.as_mut(),
            &self.settings.camera,
            kind,
            target,
            self.request.video_duration,
        );

        if let Some(guard) = light {
            self.stages.enter(Stage::AuxOff);
            let switched_off = guard.switch_off();
            captured?;
            switched_off?;
        } else {
            captured?;
        }

        let artifact = match kind {
            CaptureKind::Photo => CaptureArtifact::temporary(kind, paths.photo.clone()),
            CaptureKind::Video => CaptureArtifact::temporary(kind, paths.video.clone()),
        };
        if artifact.is_temporary {
            temps.track(&artifact.path);
        }

        if kind == CaptureKind::Video {
            check_interrupt(&self.interrupt, Stage::Transcoding)?;
            self.stages.enter(Stage::Transcoding);
            self.parts.transcoder.convert(&paths.raw_video, &artifact.path)?;
        }

        check_interrupt(&self.interrupt, Stage::Notifying)?;
        self.stages.enter(Stage::Notifying);
        let delivery = self.parts.notifier.dispatch(&self.request, &artifact);

        self.stages.enter(Stage::CleaningUp);
        let cleanup = temps.remove_all();
        let notifications = delivery?;
        cleanup?;

        Ok((artifact, notifications))
    }
}

fn check_interrupt(flag: &AtomicBool, next: Stage) -> Result<(), PipelineError> {
    if flag.load(Ordering::SeqCst) {
        tracing::warn!(%next, "Interrupt received, stopping");
        return Err(PipelineError::Interrupted(next));
    }
    Ok(())
}

/// Opens the camera, captures into `target` and closes it again.
fn capture_into(
    camera: &mut dyn Camera,
    config: &CameraConfig,
    kind: CaptureKind,
    target: &Path,
    duration: Duration,
) -> Result<(), CameraError> {
    let mut session = CameraSession::open(camera, config)?;
    match kind {
        CaptureKind::Photo => session.capture_photo(target),
        CaptureKind::Video => session.record_video(target, duration),
    }
}
