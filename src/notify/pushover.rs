//! Pushover push notifications with an image attachment.
//!
//! Posts a multipart form to the Pushover messages API. Recipients are
//! given by name on the command line and resolved to user keys through
//! the `[pushover.users]` table.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{multipart, Client};

use super::email::mime_type;
use super::traits::{NotifyError, PushTransport};
use crate::config::PushoverConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends notifications through the Pushover API.
#[derive(Debug)]
pub struct PushoverClient {
    client: Client,
    api_url: String,
    token: String,
    users: BTreeMap<String, String>,
}

impl PushoverClient {
    /// Creates a client from configuration.
    ///
    /// The application token comes from the config or, failing that, the
    /// `PUSHOVER_TOKEN` environment variable.
    pub fn from_config(config: &PushoverConfig) -> Result<Self, NotifyError> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("PUSHOVER_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                NotifyError::Config(
                    "Pushover token missing (set pushover.token or PUSHOVER_TOKEN)".to_string(),
                )
            })?;

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token,
            users: config.users.clone(),
        })
    }

    /// Maps a recipient name to a user key.
    ///
    /// Unlisted values that look like a Pushover key (30 alphanumerics)
    /// are used as-is.
    pub fn resolve_recipient(&self, recipient: &str) -> Result<String, NotifyError> {
        if let Some(key) = self.users.get(recipient) {
            return Ok(key.clone());
        }
        let looks_like_key =
            recipient.len() == 30 && recipient.chars().all(|c| c.is_ascii_alphanumeric());
        if looks_like_key {
            Ok(recipient.to_string())
        } else {
            Err(NotifyError::UnknownRecipient(recipient.to_string()))
        }
    }
}

impl PushTransport for PushoverClient {
    fn send_push(
        &self,
        recipient: &str,
        subject: &str,
        attachment: &Path,
    ) -> Result<(), NotifyError> {
        let user = self.resolve_recipient(recipient)?;

        let bytes = std::fs::read(attachment).map_err(|source| NotifyError::Attachment {
            path: attachment.to_path_buf(),
            source,
        })?;
        let filename = attachment
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "capture".to_string());
        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime_type(attachment))?;

        let form = multipart::Form::new()
            .text("token", self.token.clone())
            .text("user", user)
            .text("title", subject.to_string())
            .text("message", subject.to_string())
            .part("attachment", part);

        tracing::debug!(recipient, "Sending Pushover notification");

        let response = self.client.post(&self.api_url).multipart(form).send()?;
        let status = response.status();
        let body: serde_json::Value = response.json().unwrap_or(serde_json::Value::Null);

        if status.is_success() && body.get("status").and_then(|s| s.as_i64()) == Some(1) {
            tracing::info!(channel = "pushover", recipient, subject, "notification delivered");
            return Ok(());
        }

        let message = body
            .get("errors")
            .and_then(|e| e.as_array())
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "unknown Pushover API error".to_string());

        Err(NotifyError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
