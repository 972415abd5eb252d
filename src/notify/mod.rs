//! Delivery of the finished capture.
//!
//! This module provides:
//! - `MailTransport` / `PushTransport` traits for the two channels
//! - SMTP (`lettre`) and Pushover (`reqwest`) implementations
//! - `Notifier`, which applies the delivery policy

mod dispatcher;
mod email;
mod pushover;
mod traits;

pub use dispatcher::Notifier;
pub use email::{mime_type, SmtpMailer};
pub use pushover::PushoverClient;
pub use traits::{
    compose_subject, Channel, MailTransport, NotificationResult, NotifyError, PushTransport,
    RecordingChannel, SentMessage, BODY_TEXT,
};
