//! Routes a finished capture to its delivery channels.
//!
//! E-mail is mandatory and its failure is returned to the caller. Push
//! follows only for photos with a configured recipient; a push failure is
//! logged and reported in the results but never fails the run.

use chrono::Local;

use super::traits::{
    compose_subject, Channel, MailTransport, NotificationResult, NotifyError, PushTransport,
    BODY_TEXT,
};
use crate::job::{CaptureArtifact, CaptureKind, JobRequest};

/// Dispatches the capture artifact to e-mail and, optionally, push.
pub struct Notifier {
    mail: Box<dyn MailTransport>,
    push: Option<Box<dyn PushTransport>>,
}

impl Notifier {
    /// A notifier with e-mail only.
    pub fn new(mail: Box<dyn MailTransport>) -> Self {
        Self { mail, push: None }
    }

    /// Adds the push channel.
    pub fn with_push(mut self, push: Box<dyn PushTransport>) -> Self {
        self.push = Some(push);
        self
    }

    /// Sends the artifact.
    ///
    /// Returns the per-channel results when the e-mail went out, or the
    /// e-mail error otherwise (push is then not attempted).
    pub fn dispatch(
        &self,
        request: &JobRequest,
        artifact: &CaptureArtifact,
    ) -> Result<Vec<NotificationResult>, NotifyError> {
        let subject = compose_subject(artifact.kind, Local::now());
        let mut results = Vec::with_capacity(2);

        tracing::info!(
            kind = %artifact.kind,
            to = %request.recipient_email,
            "Sending capture"
        );
        if let Err(e) = self.mail.send_email(
            &request.recipient_email,
            &subject,
            BODY_TEXT,
            &artifact.path,
        ) {
            tracing::error!(channel = %Channel::Email, error = %e, "Notification delivery failed");
            return Err(e);
        }
        results.push(NotificationResult::delivered(Channel::Email));

        // Video captures never go to push.
        let recipient = match (&request.pushover_recipient, artifact.kind) {
            (Some(recipient), CaptureKind::Photo) => recipient,
            _ => return Ok(results),
        };

        let outcome = match &self.push {
            Some(push) => push.send_push(recipient, &subject, &artifact.path),
            None => Err(NotifyError::Config(
                "push recipient given but Pushover is not configured".to_string(),
            )),
        };
        match outcome {
            Ok(()) => results.push(NotificationResult::delivered(Channel::Pushover)),
            Err(e) => {
                tracing::warn!(
                    channel = %Channel::Pushover,
                    recipient = %recipient,
                    error = %e,
                    "Notification delivery failed"
                );
                results.push(NotificationResult::failed(Channel::Pushover, e));
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingChannel;

    fn photo() -> CaptureArtifact {
        CaptureArtifact::temporary(CaptureKind::Photo, "/tmp/snap.jpg")
    }

    fn video() -> CaptureArtifact {
        CaptureArtifact::temporary(CaptureKind::Video, "/tmp/snap.mp4")
    }

    #[test]
    fn test_email_only() {
        let mail = RecordingChannel::new();
        let notifier = Notifier::new(Box::new(mail.clone()));
        let request = JobRequest::new(CaptureKind::Photo, "a@b.com");

        let results = notifier.dispatch(&request, &photo()).unwrap();

        assert_eq!(results, vec![NotificationResult::delivered(Channel::Email)]);
        let sent = mail.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@b.com");
        assert!(sent[0].subject.starts_with("Just Snapped a photo at "));
    }

    #[test]
    fn test_push_follows_email_for_photo() {
        let mail = RecordingChannel::new();
        let push = RecordingChannel::new();
        let notifier = Notifier::new(Box::new(mail.clone())).with_push(Box::new(push.clone()));
        let request = JobRequest::new(CaptureKind::Photo, "a@b.com").with_pushover("alice");

        let results = notifier.dispatch(&request, &photo()).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        let pushed = push.sent();
        assert_eq!(pushed[0].to, "alice");
        assert_eq!(pushed[0].subject, mail.sent()[0].subject);
    }

    #[test]
    fn test_never_push_video() {
        let push = RecordingChannel::new();
        let notifier =
            Notifier::new(Box::new(RecordingChannel::new())).with_push(Box::new(push.clone()));
        let request = JobRequest::new(CaptureKind::Video, "a@b.com").with_pushover("alice");

        let results = notifier.dispatch(&request, &video()).unwrap();

        assert_eq!(results.len(), 1);
        assert!(push.sent().is_empty());
    }

    #[test]
    fn test_push_failure_is_not_fatal() {
        let notifier = Notifier::new(Box::new(RecordingChannel::new()))
            .with_push(Box::new(RecordingChannel::failing()));
        let request = JobRequest::new(CaptureKind::Photo, "a@b.com").with_pushover("alice");

        let results = notifier.dispatch(&request, &photo()).unwrap();

        assert!(results[0].success);
        assert_eq!(results[1].channel, Channel::Pushover);
        assert!(!results[1].success);
        assert!(results[1].error.is_some());
    }

    #[test]
    fn test_push_without_transport_is_reported() {
        let notifier = Notifier::new(Box::new(RecordingChannel::new()));
        let request = JobRequest::new(CaptureKind::Photo, "a@b.com").with_pushover("alice");

        let results = notifier.dispatch(&request, &photo()).unwrap();
        assert!(!results[1].success);
    }

    #[test]
    fn test_email_failure_skips_push() {
        let push = RecordingChannel::new();
        let notifier =
            Notifier::new(Box::new(RecordingChannel::failing())).with_push(Box::new(push.clone()));
        let request = JobRequest::new(CaptureKind::Photo, "a@b.com").with_pushover("alice");

        assert!(notifier.dispatch(&request, &photo()).is_err());
        assert!(push.sent().is_empty());
    }
}
