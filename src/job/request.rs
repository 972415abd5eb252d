//! Job request: what to capture and where to send it.
//!
//! A request is built once from the command line, validated, and then
//! handed to the pipeline by value. Nothing reads process-wide settings
//! after that point.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default job name, used for the run lock and temp file names.
pub const DEFAULT_JOB_NAME: &str = "snapmail";

/// Default length of a video clip.
pub const DEFAULT_VIDEO_DURATION: Duration = Duration::from_secs(5);

/// Longest video clip a request may ask for.
pub const MAX_VIDEO_DURATION: Duration = Duration::from_secs(60 * 60);

/// Errors raised while validating a job request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("unknown capture type '{0}' (expected 'photo' or 'video')")]
    UnknownCaptureKind(String),
    #[error("a recipient e-mail address is required")]
    MissingRecipient,
    #[error("invalid recipient e-mail address '{0}'")]
    InvalidRecipient(String),
    #[error("invalid debug level {0} (expected 0, 1, 2 or 9)")]
    InvalidDebugLevel(u8),
    #[error("video duration must be greater than zero")]
    ZeroDuration,
    #[error("video duration of {}s exceeds the {}s limit", .0.as_secs(), MAX_VIDEO_DURATION.as_secs())]
    DurationTooLong(Duration),
    #[error("invalid job name '{0}' (use letters, digits, '.', '_' or '-')")]
    InvalidJobName(String),
}

/// What the camera should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Photo,
    Video,
}

impl CaptureKind {
    /// Lowercase name, as typed on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureKind::Photo => "photo",
            CaptureKind::Video => "video",
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureKind {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" => Ok(CaptureKind::Photo),
            "video" => Ok(CaptureKind::Video),
            _ => Err(RequestError::UnknownCaptureKind(s.to_string())),
        }
    }
}

/// Diagnostic output selected with `--debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    /// Logging disabled.
    #[default]
    Off,
    /// Log to standard error.
    Stderr,
    /// Log to a file in the temp directory.
    File,
    /// Debug-level logging to standard error.
    Verbose,
}

impl DebugLevel {
    /// Maps the numeric `--debug` code.
    pub fn from_code(code: u8) -> Result<Self, RequestError> {
        match code {
            0 => Ok(DebugLevel::Off),
            1 => Ok(DebugLevel::Stderr),
            2 => Ok(DebugLevel::File),
            9 => Ok(DebugLevel::Verbose),
            other => Err(RequestError::InvalidDebugLevel(other)),
        }
    }

    /// Numeric code as accepted on the command line.
    pub fn code(self) -> u8 {
        match self {
            DebugLevel::Off => 0,
            DebugLevel::Stderr => 1,
            DebugLevel::File => 2,
            DebugLevel::Verbose => 9,
        }
    }

    /// True when failures should be reported with full detail.
    pub fn is_enabled(self) -> bool {
        self != DebugLevel::Off
    }
}

/// A single capture-and-notify job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Photo or video.
    pub capture_kind: CaptureKind,
    /// Destination for the mandatory e-mail.
    pub recipient_email: String,
    /// Energize the auxiliary output (light) during capture.
    pub aux_output_enabled: bool,
    /// Pushover user name; only honoured for photos.
    pub pushover_recipient: Option<String>,
    /// Diagnostic output level.
    pub debug_level: DebugLevel,
    /// Scopes the run lock and temp file names.
    pub job_name: String,
    /// Length of a video clip.
    pub video_duration: Duration,
}

impl JobRequest {
    /// Creates a request with default job name, duration and no options.
    pub fn new(capture_kind: CaptureKind, recipient_email: impl Into<String>) -> Self {
        Self {
            capture_kind,
            recipient_email: recipient_email.into(),
            aux_output_enabled: false,
            pushover_recipient: None,
            debug_level: DebugLevel::Off,
            job_name: DEFAULT_JOB_NAME.to_string(),
            video_duration: DEFAULT_VIDEO_DURATION,
        }
    }

    pub fn with_light(mut self, enabled: bool) -> Self {
        self.aux_output_enabled = enabled;
        self
    }

    pub fn with_pushover(mut self, recipient: impl Into<String>) -> Self {
        self.pushover_recipient = Some(recipient.into());
        self
    }

    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    pub fn with_job_name(mut self, name: impl Into<String>) -> Self {
        self.job_name = name.into();
        self
    }

    pub fn with_video_duration(mut self, duration: Duration) -> Self {
        self.video_duration = duration;
        self
    }

    /// True when a push notification should follow the e-mail.
    pub fn wants_push(&self) -> bool {
        self.capture_kind == CaptureKind::Photo && self.pushover_recipient.is_some()
    }

    /// Validates the request before any resource is touched.
    pub fn validate(&self) -> Result<(), RequestError> {
        let recipient = self.recipient_email.trim();
        if recipient.is_empty() {
            return Err(RequestError::MissingRecipient);
        }
        recipient
            .parse::<lettre::message::Mailbox>()
            .map_err(|_| RequestError::InvalidRecipient(self.recipient_email.clone()))?;

        if self.video_duration.is_zero() {
            return Err(RequestError::ZeroDuration);
        }
        if self.video_duration > MAX_VIDEO_DURATION {
            return Err(RequestError::DurationTooLong(self.video_duration));
        }

        let name_ok = !self.job_name.is_empty()
            && self
                .job_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            && !self.job_name.starts_with('.');
        if !name_ok {
            return Err(RequestError::InvalidJobName(self.job_name.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_request_valid() {
        let request = JobRequest::new(CaptureKind::Photo, "a@b.com");
        assert!(request.validate().is_ok());
        assert_eq!(request.job_name, DEFAULT_JOB_NAME);
        assert_eq!(request.video_duration, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_recipient() {
        let request = JobRequest::new(CaptureKind::Photo, "  ");
        assert_eq!(request.validate(), Err(RequestError::MissingRecipient));
    }

    #[test]
    fn test_invalid_recipient() {
        let request = JobRequest::new(CaptureKind::Video, "not-an-address");
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let request = JobRequest::new(CaptureKind::Video, "a@b.com")
            .with_video_duration(Duration::ZERO);
        assert_eq!(request.validate(), Err(RequestError::ZeroDuration));
    }

    #[test]
    fn test_duration_upper_bound() {
        let at_limit = JobRequest::new(CaptureKind::Video, "a@b.com")
            .with_video_duration(MAX_VIDEO_DURATION);
        assert!(at_limit.validate().is_ok());

        let huge = Duration::from_secs(u64::MAX);
        let request =
            JobRequest::new(CaptureKind::Video, "a@b.com").with_video_duration(huge);
        assert_eq!(request.validate(), Err(RequestError::DurationTooLong(huge)));
    }

    #[test]
    fn test_job_name_cannot_escape_directory() {
        for bad in ["", "../etc", "a/b", ".hidden", "two words"] {
            let request = JobRequest::new(CaptureKind::Photo, "a@b.com").with_job_name(bad);
            assert!(
                matches!(request.validate(), Err(RequestError::InvalidJobName(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_push_only_for_photos() {
        let photo = JobRequest::new(CaptureKind::Photo, "a@b.com").with_pushover("alice");
        let video = JobRequest::new(CaptureKind::Video, "a@b.com").with_pushover("alice");
        assert!(photo.wants_push());
        assert!(!video.wants_push());
        assert!(!JobRequest::new(CaptureKind::Photo, "a@b.com").wants_push());
    }

    #[test]
    fn test_debug_levels() {
        assert_eq!(DebugLevel::from_code(0), Ok(DebugLevel::Off));
        assert_eq!(DebugLevel::from_code(9), Ok(DebugLevel::Verbose));
        assert_eq!(
            DebugLevel::from_code(3),
            Err(RequestError::InvalidDebugLevel(3))
        );
        assert!(!DebugLevel::Off.is_enabled());
        assert!(DebugLevel::File.is_enabled());
    }

    #[test]
    fn test_unknown_capture_kind() {
        assert!(matches!(
            "timelapse".parse::<CaptureKind>(),
            Err(RequestError::UnknownCaptureKind(_))
        ));
    }

    proptest! {
        #[test]
        fn capture_kind_parse_ignores_case(mask in proptest::collection::vec(any::<bool>(), 5)) {
            for (word, kind) in [("photo", CaptureKind::Photo), ("video", CaptureKind::Video)] {
                let mixed: String = word
                    .chars()
                    .zip(mask.iter())
                    .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
                    .collect();
                prop_assert_eq!(mixed.parse::<CaptureKind>().unwrap(), kind);
            }
        }

        #[test]
        fn debug_code_roundtrips(code in any::<u8>()) {
            match DebugLevel::from_code(code) {
                Ok(level) => prop_assert_eq!(level.code(), code),
                Err(e) => prop_assert_eq!(e, RequestError::InvalidDebugLevel(code)),
            }
        }
    }
}
