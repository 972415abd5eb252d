//! Snapmail CLI
//!
//! Takes one photo or video and mails it to the given address.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use snapmail::{
    capture::{MockCamera, RpiCamera},
    config::{ConfigError, Settings},
    job::{CaptureKind, DebugLevel, JobRequest, DEFAULT_JOB_NAME},
    light::{AuxOutput, MockOutput, SysfsOutput},
    notify::{Notifier, PushoverClient, RecordingChannel, SmtpMailer},
    pipeline::{Collaborators, Pipeline, PipelineError, PipelineSettings, RunFailure, RunReport, Stage},
    transcode::{MockTranscoder, Mp4BoxTranscoder},
};

/// Take a photo or a short video and e-mail it.
#[derive(Parser, Debug)]
#[command(name = "snapmail", version, about)]
struct Cli {
    /// What to capture: photo or video.
    capture_type: CaptureKind,

    /// Address that receives the capture.
    email_to: String,

    /// Switch the capture light on while capturing.
    #[arg(short, long)]
    light: bool,

    /// Also send photos to this Pushover user.
    #[arg(long = "pushoverTo", value_name = "NAME")]
    pushover_to: Option<String>,

    /// 0 = quiet, 1 = log to stderr, 2 = log to a file, 9 = verbose.
    #[arg(long, default_value_t = 0)]
    debug: u8,

    /// Path to a TOML settings file.
    #[arg(long, env = "SNAPMAIL_CONFIG")]
    config: Option<PathBuf>,

    /// Video length in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    duration: u64,

    /// Names the lock and temp files; runs with different names do not
    /// exclude each other.
    #[arg(long, default_value = DEFAULT_JOB_NAME)]
    job_name: String,

    /// Use in-process mock devices and transports.
    #[arg(long)]
    mock: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let detailed = cli.debug != 0;

    match run(cli) {
        Ok(report) => {
            for failed in report.failed_channels() {
                eprintln!(
                    "warning: {} notification failed: {}",
                    failed.channel,
                    failed.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!("Sent {} {}", report.kind, report.artifact.display());
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("{}", failure.render(detailed));
            ExitCode::from(failure.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<RunReport, RunFailure> {
    let detailed = cli.debug != 0;
    let debug_level =
        DebugLevel::from_code(cli.debug).map_err(|e| setup_failure(e.into(), detailed))?;

    let mut request = JobRequest::new(cli.capture_type, cli.email_to)
        .with_light(cli.light)
        .with_debug_level(debug_level)
        .with_job_name(cli.job_name)
        .with_video_duration(Duration::from_secs(cli.duration));
    if let Some(recipient) = cli.pushover_to {
        request = request.with_pushover(recipient);
    }

    let settings =
        Settings::load(cli.config.as_deref()).map_err(|e| setup_failure(e.into(), detailed))?;

    init_logging(debug_level, &settings.paths.temp_dir, &request.job_name);
    info!(debug = debug_level.code(), "Snapmail v{}", snapmail::VERSION);
    if let Some(path) = &cli.config {
        info!(path = %path.display(), "Loaded settings");
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Failed to install interrupt handler");
    }

    let parts = if cli.mock {
        info!("Using mock devices and transports");
        mock_parts()
    } else {
        live_parts(&settings, &request).map_err(|e| setup_failure(e, detailed))?
    };

    Pipeline::new(request, PipelineSettings::from(&settings), parts)?
        .with_interrupt(interrupt)
        .run()
}

fn setup_failure(error: PipelineError, detailed: bool) -> RunFailure {
    RunFailure::new(Stage::Idle, error, vec![Stage::Idle], detailed)
}

/// Installs the subscriber for the requested debug level.
///
/// `RUST_LOG` directives are applied on top of the level's default.
fn init_logging(level: DebugLevel, temp_dir: &Path, job_name: &str) {
    let default = match level {
        DebugLevel::Off => return,
        DebugLevel::Stderr | DebugLevel::File => tracing::Level::INFO,
        DebugLevel::Verbose => tracing::Level::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    if level == DebugLevel::File {
        let path = temp_dir.join(format!("{job_name}.log"));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
                return;
            }
            Err(e) => eprintln!(
                "warning: cannot open log file {}: {e}; logging to stderr",
                path.display()
            ),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn live_parts(settings: &Settings, request: &JobRequest) -> Result<Collaborators, PipelineError> {
    let mailer = SmtpMailer::from_config(&settings.smtp)
        .map_err(|e| ConfigError::Invalid(format!("smtp: {e}")))?;
    let mut notifier = Notifier::new(Box::new(mailer));

    // Without a push transport the notifier records the push as failed.
    if request.wants_push() {
        match &settings.pushover {
            Some(config) => match PushoverClient::from_config(config) {
                Ok(client) => notifier = notifier.with_push(Box::new(client)),
                Err(e) => warn!(error = %e, "Pushover disabled"),
            },
            None => warn!("No [pushover] section configured"),
        }
    }

    let light = request
        .aux_output_enabled
        .then(|| Box::new(SysfsOutput::from_config(&settings.light)) as Box<dyn AuxOutput>);

    Ok(Collaborators {
        camera: Box::new(RpiCamera::new()),
        light,
        transcoder: Box::new(Mp4BoxTranscoder::from_settings(settings)),
        notifier,
    })
}

fn mock_parts() -> Collaborators {
    let channel = RecordingChannel::new();
    Collaborators {
        camera: Box::new(MockCamera::new()),
        light: Some(Box::new(MockOutput::new())),
        transcoder: Box::new(MockTranscoder::new()),
        notifier: Notifier::new(Box::new(channel.clone())).with_push(Box::new(channel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_flag_spelling() {
        let cli = Cli::try_parse_from([
            "snapmail",
            "VIDEO",
            "a@b.com",
            "-l",
            "--pushoverTo",
            "alice",
            "--debug",
            "9",
        ])
        .unwrap();

        assert_eq!(cli.capture_type, CaptureKind::Video);
        assert_eq!(cli.email_to, "a@b.com");
        assert!(cli.light);
        assert_eq!(cli.pushover_to.as_deref(), Some("alice"));
        assert_eq!(cli.debug, 9);
        assert_eq!(cli.duration, 5);
        assert_eq!(cli.job_name, DEFAULT_JOB_NAME);
        assert!(!cli.mock);
    }

    #[test]
    fn test_long_light_flag() {
        let cli = Cli::try_parse_from(["snapmail", "photo", "a@b.com", "--light"]).unwrap();
        assert_eq!(cli.capture_type, CaptureKind::Photo);
        assert!(cli.light);
        assert!(cli.pushover_to.is_none());
    }

    #[test]
    fn test_unknown_capture_type_rejected() {
        assert!(Cli::try_parse_from(["snapmail", "timelapse", "a@b.com"]).is_err());
    }

    #[test]
    fn test_recipient_required() {
        assert!(Cli::try_parse_from(["snapmail", "photo"]).is_err());
    }

    #[test]
    fn test_excessive_duration_is_invalid_request() {
        let cli = Cli::try_parse_from([
            "snapmail",
            "video",
            "a@b.com",
            "--mock",
            "--duration",
            "18446744073709551615",
        ])
        .unwrap();

        let failure = run(cli).unwrap_err();
        assert_eq!(failure.exit_code(), 2);
        assert!(failure.render(false).contains("exceeds"));
    }
}
