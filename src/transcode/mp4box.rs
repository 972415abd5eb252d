//! GPAC `MP4Box` wrapper.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{TranscodeError, Transcoder};
use crate::config::Settings;

/// Wraps a raw H.264 stream into MP4 with `MP4Box -fps <n> -add <raw> <out>`.
#[derive(Debug, Clone)]
pub struct Mp4BoxTranscoder {
    program: PathBuf,
    fps: u32,
    log_path: PathBuf,
}

impl Mp4BoxTranscoder {
    pub fn new(program: impl Into<PathBuf>, fps: u32, log_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            fps,
            log_path: log_path.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.transcode.program,
            settings.transcode.fps,
            settings.transcode_log(),
        )
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn open_log(&self) -> Result<File, TranscodeError> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.log_path)
            .map_err(|source| TranscodeError::Log {
                path: self.log_path.clone(),
                source,
            })
    }
}

impl Transcoder for Mp4BoxTranscoder {
    fn convert(&self, raw: &Path, output: &Path) -> Result<(), TranscodeError> {
        // -add appends a track to an existing file, so start from nothing.
        match std::fs::remove_file(output) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(TranscodeError::Spawn {
                    program: self.program_name(),
                    source,
                })
            }
        }

        let stdout = self.open_log()?;
        let stderr = stdout.try_clone().map_err(|source| TranscodeError::Log {
            path: self.log_path.clone(),
            source,
        })?;

        tracing::info!(
            program = %self.program.display(),
            fps = self.fps,
            input = %raw.display(),
            output = %output.display(),
            "Converting video"
        );

        let status = Command::new(&self.program)
            .arg("-fps")
            .arg(self.fps.to_string())
            .arg("-add")
            .arg(raw)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|source| TranscodeError::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !status.success() {
            tracing::warn!(code = ?status.code(), log = %self.log_path.display(), "Transcoder failed");
            return Err(TranscodeError::ExitStatus {
                program: self.program_name(),
                code: status.code(),
                log: self.log_path.clone(),
            });
        }

        let produced = std::fs::metadata(output)
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !produced {
            return Err(TranscodeError::MissingOutput(output.to_path_buf()));
        }

        tracing::debug!(output = %output.display(), "Video converted");
        Ok(())
    }
}
