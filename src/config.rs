//! Settings file.
//!
//! Every section has defaults, so the program runs without a file on a
//! stock Raspberry Pi with a local mail relay. Secrets can stay out of the
//! file: SMTP credentials come from `SMTP_USERNAME` / `SMTP_PASSWORD` and
//! the Pushover application token from `PUSHOVER_TOKEN`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capture::CameraConfig;

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub transcode: TranscodeConfig,
    pub smtp: SmtpConfig,
    pub pushover: Option<PushoverConfig>,
}

/// Where temp artifacts and lock files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub temp_dir: PathBuf,
    pub lock_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            temp_dir: tmp.clone(),
            lock_dir: tmp,
        }
    }
}

/// GPIO line driving the capture light.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Kernel GPIO number (BCM numbering on a Pi; physical pin 12 is 18).
    pub gpio_line: u32,
    pub sysfs_root: PathBuf,
    /// Relay boards usually switch on when the line is pulled low.
    pub active_low: bool,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            gpio_line: 18,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
            active_low: true,
        }
    }
}

/// External video converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub program: PathBuf,
    pub fps: u32,
    /// Receives the converter's stdout and stderr. Defaults to
    /// `<temp_dir>/MP4Box.out`.
    pub log_file: Option<PathBuf>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/MP4Box"),
            fps: 30,
            log_file: None,
        }
    }
}

/// Outgoing mail server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    /// Defaults to 587, or 25 when TLS is disabled.
    pub port: Option<u16>,
    pub tls: bool,
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            tls: false,
            from: "snapmail <snapmail@localhost>".to_string(),
        }
    }
}

/// Pushover application and named users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushoverConfig {
    pub api_url: String,
    /// Application token; `PUSHOVER_TOKEN` is used when absent.
    pub token: Option<String>,
    /// Recipient name → Pushover user key.
    pub users: BTreeMap<String, String>,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.pushover.net/1/messages.json".to_string(),
            token: None,
            users: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads from `path` when given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        if self.transcode.fps == 0 || self.transcode.fps > 120 {
            return Err(ConfigError::Invalid(
                "transcode: fps must be 1-120".into(),
            ));
        }
        if self.smtp.host.trim().is_empty() {
            return Err(ConfigError::Invalid("smtp: host is required".into()));
        }
        if let Some(pushover) = &self.pushover {
            if pushover.api_url.trim().is_empty() {
                return Err(ConfigError::Invalid("pushover: api_url is required".into()));
            }
        }
        Ok(())
    }

    /// Diagnostic log for the transcoder.
    pub fn transcode_log(&self) -> PathBuf {
        self.transcode
            .log_file
            .clone()
            .unwrap_or_else(|| self.paths.temp_dir.join("MP4Box.out"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.light.gpio_line, 18);
        assert!(settings.light.active_low);
        assert_eq!(settings.transcode.fps, 30);
        assert!(settings.pushover.is_none());
    }

    #[test]
    fn test_partial_file() {
        let settings = Settings::from_toml(
            r#"
            [paths]
            temp_dir = "/var/tmp"

            [smtp]
            host = "smtp.example.com"
            port = 465
            tls = true
            from = "cam@example.com"

            [pushover]
            token = "app-token"
            [pushover.users]
            alice = "u123"
            "#,
        )
        .unwrap();

        assert_eq!(settings.paths.temp_dir, PathBuf::from("/var/tmp"));
        assert_eq!(settings.smtp.port, Some(465));
        assert_eq!(settings.camera, CameraConfig::default());
        let pushover = settings.pushover.unwrap();
        assert_eq!(pushover.users.get("alice").map(String::as_str), Some("u123"));
        assert!(pushover.api_url.starts_with("https://api.pushover.net"));
    }

    #[test]
    fn test_transcode_log_default() {
        let mut settings = Settings::default();
        settings.paths.temp_dir = PathBuf::from("/scratch");
        assert_eq!(settings.transcode_log(), PathBuf::from("/scratch/MP4Box.out"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Settings::from_toml("[transcode]\nfps = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml("[camera]\nwidth = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml("[smtp\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Settings::from_file("/nonexistent/snapmail.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
