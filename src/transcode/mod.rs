//! Raw video conversion.
//!
//! The camera produces a bare H.264 elementary stream, which most mail
//! clients cannot play. A [`Transcoder`] wraps it into a distributable
//! container before delivery.

mod mp4box;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;

pub use mp4box::Mp4BoxTranscoder;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} failed with exit code {} (see {})", code_text(.code), .log.display())]
    ExitStatus {
        program: String,
        code: Option<i32>,
        log: PathBuf,
    },
    #[error("transcoder produced no output at {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("failed to open diagnostic log {}: {source}", .path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn code_text(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none (killed by signal)".to_string())
}

/// Converts a raw capture into a deliverable file.
pub trait Transcoder {
    fn convert(&self, raw: &Path, output: &Path) -> Result<(), TranscodeError>;
}

/// In-process transcoder that copies the input, or fails on demand.
#[derive(Debug, Clone, Default)]
pub struct MockTranscoder {
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    exit_code: Option<i32>,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transcoder that behaves like a process exiting with `code`.
    pub fn failing(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// Every `(raw, output)` pair passed to `convert`.
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Transcoder for MockTranscoder {
    fn convert(&self, raw: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((raw.to_path_buf(), output.to_path_buf()));

        if let Some(code) = self.exit_code {
            return Err(TranscodeError::ExitStatus {
                program: "mock".into(),
                code: Some(code),
                log: PathBuf::from("/dev/null"),
            });
        }
        std::fs::copy(raw, output).map_err(|source| TranscodeError::Spawn {
            program: "mock".into(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_message() {
        let err = TranscodeError::ExitStatus {
            program: "MP4Box".into(),
            code: Some(1),
            log: PathBuf::from("/tmp/MP4Box.out"),
        };
        assert_eq!(
            err.to_string(),
            "MP4Box failed with exit code 1 (see /tmp/MP4Box.out)"
        );
    }

    #[test]
    fn test_mock_copies_input() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("in.h264");
        let out = dir.path().join("out.mp4");
        std::fs::write(&raw, b"frames").unwrap();

        let transcoder = MockTranscoder::new();
        transcoder.convert(&raw, &out).unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"frames");
        assert_eq!(transcoder.calls(), vec![(raw, out)]);
    }

    #[test]
    fn test_mock_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = MockTranscoder::failing(2);
        let result = transcoder.convert(&dir.path().join("a"), &dir.path().join("b"));
        assert!(matches!(
            result,
            Err(TranscodeError::ExitStatus { code: Some(2), .. })
        ));
    }
}
