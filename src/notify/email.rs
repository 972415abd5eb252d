//! SMTP e-mail delivery via `lettre`.
//!
//! Sends one message per capture with the artifact attached. Supports
//! STARTTLS, implicit TLS on port 465, and plain connections to a local
//! relay.

use std::path::Path;

use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use super::traits::{MailTransport, NotifyError};
use crate::config::SmtpConfig;

/// Sends captures as e-mail attachments via SMTP.
#[derive(Debug)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from SMTP configuration.
    ///
    /// SMTP credentials are resolved from the `SMTP_USERNAME` and `SMTP_PASSWORD`
    /// environment variables. If both are set, they are passed to the transport;
    /// otherwise the connection is unauthenticated.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let port = config.port.unwrap_or(if config.tls { 587 } else { 25 });

        let mut builder = if !config.tls {
            SmtpTransport::builder_dangerous(&config.host).port(port)
        } else if port == 465 {
            SmtpTransport::relay(&config.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        };

        if let (Ok(username), Ok(password)) =
            (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD"))
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<Message, NotifyError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

        let bytes = std::fs::read(attachment).map_err(|source| NotifyError::Attachment {
            path: attachment.to_path_buf(),
            source,
        })?;
        let content_type = ContentType::parse(mime_type(attachment))
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        let filename = attachment
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "capture".to_string());

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(body.to_string()))
                    .singlepart(Attachment::new(filename).body(bytes, content_type)),
            )
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

impl MailTransport for SmtpMailer {
    fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<(), NotifyError> {
        let email = self.build_message(to, subject, body, attachment)?;

        self.transport
            .send(&email)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::info!(
            channel = "email",
            to,
            subject,
            "notification delivered"
        );
        Ok(())
    }
}

/// MIME type for a capture artifact, by extension.
pub fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("mp4") => "video/mp4",
        Some("h264") => "video/h264",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            port: Some(587),
            tls: true,
            from: "Camera <cam@example.com>".into(),
        }
    }

    #[test]
    fn from_config_valid() {
        assert!(SmtpMailer::from_config(&config()).is_ok());
    }

    #[test]
    fn from_config_implicit_tls_port() {
        let config = SmtpConfig {
            port: Some(465),
            ..config()
        };
        assert!(SmtpMailer::from_config(&config).is_ok());
    }

    #[test]
    fn from_config_no_tls() {
        assert!(SmtpMailer::from_config(&SmtpConfig::default()).is_ok());
    }

    #[test]
    fn from_config_invalid_from_address() {
        let config = SmtpConfig {
            from: "bad-address".into(),
            ..config()
        };
        let err = SmtpMailer::from_config(&config).unwrap_err().to_string();
        assert!(err.contains("Configuration error"), "got: {err}");
    }

    #[test]
    fn message_carries_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("snap.jpg");
        std::fs::write(&photo, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

        let mailer = SmtpMailer::from_config(&config()).unwrap();
        let message = mailer
            .build_message("a@b.com", "Just Snapped a photo", "body", &photo)
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("Subject: Just Snapped a photo"));
        assert!(raw.contains("image/jpeg"));
        assert!(raw.contains("snap.jpg"));
    }

    #[test]
    fn missing_attachment_is_error() {
        let mailer = SmtpMailer::from_config(&config()).unwrap();
        let result = mailer.build_message("a@b.com", "s", "b", Path::new("/nonexistent/x.jpg"));
        assert!(matches!(result, Err(NotifyError::Attachment { .. })));
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_type(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(mime_type(Path::new("a")), "application/octet-stream");
    }
}
