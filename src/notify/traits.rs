//! Delivery channel traits and shared types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};

use crate::job::CaptureKind;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("failed to read attachment {}: {source}", .path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("unknown push recipient '{0}'")]
    UnknownRecipient(String),

    #[error("push service rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Outbound channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Pushover,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Email => "email",
            Channel::Pushover => "pushover",
        })
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    pub channel: Channel,
    pub success: bool,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(channel: Channel) -> Self {
        Self {
            channel,
            success: true,
            error: None,
        }
    }

    pub fn failed(channel: Channel, error: impl ToString) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Body text sent with every capture.
pub const BODY_TEXT: &str = "Please see the attached file.";

/// Builds the subject line for a capture taken at `at`.
pub fn compose_subject(kind: CaptureKind, at: DateTime<Local>) -> String {
    format!(
        "Just Snapped a {kind} at {}!",
        at.format("%Y-%m-%d_%H.%M.%S")
    )
}

/// Sends mail with a single attachment.
pub trait MailTransport {
    fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<(), NotifyError>;
}

/// Sends a push notification with an image attachment.
pub trait PushTransport {
    fn send_push(&self, recipient: &str, subject: &str, attachment: &Path)
        -> Result<(), NotifyError>;
}

/// A message captured by [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: Channel,
    pub to: String,
    pub subject: String,
    pub attachment: PathBuf,
    /// Whether the attachment existed when the message was sent.
    pub attachment_present: bool,
}

/// In-memory transport for dry runs and tests; implements both channels.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose every send fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn record(
        &self,
        channel: Channel,
        to: &str,
        subject: &str,
        attachment: &Path,
    ) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Smtp(format!("{channel} transport unreachable")));
        }
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(SentMessage {
                channel,
                to: to.to_string(),
                subject: subject.to_string(),
                attachment: attachment.to_path_buf(),
                attachment_present: attachment.exists(),
            });
        Ok(())
    }
}

impl MailTransport for RecordingChannel {
    fn send_email(
        &self,
        to: &str,
        subject: &str,
        _body: &str,
        attachment: &Path,
    ) -> Result<(), NotifyError> {
        self.record(Channel::Email, to, subject, attachment)
    }
}

impl PushTransport for RecordingChannel {
    fn send_push(
        &self,
        recipient: &str,
        subject: &str,
        attachment: &Path,
    ) -> Result<(), NotifyError> {
        self.record(Channel::Pushover, recipient, subject, attachment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_subject_format() {
        let at = Local.with_ymd_and_hms(2018, 3, 1, 7, 5, 9).unwrap();
        assert_eq!(
            compose_subject(CaptureKind::Photo, at),
            "Just Snapped a photo at 2018-03-01_07.05.09!"
        );
        assert_eq!(
            compose_subject(CaptureKind::Video, at),
            "Just Snapped a video at 2018-03-01_07.05.09!"
        );
    }

    #[test]
    fn test_recording_channel() {
        let channel = RecordingChannel::new();
        channel
            .send_email("a@b.com", "hi", BODY_TEXT, Path::new("/nonexistent.jpg"))
            .unwrap();
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, Channel::Email);
        assert!(!sent[0].attachment_present);

        assert!(RecordingChannel::failing()
            .send_push("alice", "hi", Path::new("/x"))
            .is_err());
    }

    proptest! {
        #[test]
        fn subject_timestamp_is_fixed_width(secs in 0i64..4_102_444_800) {
            let at = Local.timestamp_opt(secs, 0).single();
            prop_assume!(at.is_some());
            let subject = compose_subject(CaptureKind::Photo, at.unwrap());
            let stamp = subject
                .strip_prefix("Just Snapped a photo at ")
                .and_then(|s| s.strip_suffix('!'))
                .unwrap();
            prop_assert_eq!(stamp.len(), "YYYY-MM-DD_HH.MM.SS".len());
            prop_assert_eq!(&stamp[10..11], "_");
            prop_assert_eq!(stamp.matches('.').count(), 2);
        }
    }
}
