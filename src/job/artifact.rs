//! Capture artifacts and their temp-file lifecycle.

use std::io;
use std::path::{Path, PathBuf};

use super::CaptureKind;

/// The file produced by the capture (or transcode) stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifact {
    /// Photo or video.
    pub kind: CaptureKind,
    /// Location on disk.
    pub path: PathBuf,
    /// Whether the pipeline must delete the file when the run ends.
    pub is_temporary: bool,
}

impl CaptureArtifact {
    /// An artifact the pipeline created and will remove.
    pub fn temporary(kind: CaptureKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            is_temporary: true,
        }
    }
}

/// Fixed temp paths for one job name.
///
/// The paths are stable across runs so that a crashed run's leftovers
/// are overwritten (or removed) by the next one instead of piling up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Raw H.264 stream written by the camera.
    pub raw_video: PathBuf,
    /// MP4 produced by the transcoder.
    pub video: PathBuf,
    /// Still image.
    pub photo: PathBuf,
}

impl ArtifactPaths {
    pub fn for_job(dir: impl AsRef<Path>, job_name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            raw_video: dir.join(format!("{job_name}.h264")),
            video: dir.join(format!("{job_name}.mp4")),
            photo: dir.join(format!("{job_name}.jpg")),
        }
    }

    /// Every temp file a run of the given kind may create.
    pub fn for_kind(&self, kind: CaptureKind) -> Vec<&Path> {
        match kind {
            CaptureKind::Photo => vec![self.photo.as_path()],
            CaptureKind::Video => vec![self.raw_video.as_path(), self.video.as_path()],
        }
    }
}

/// Tracks temp files and removes them when dropped.
///
/// Paths are registered before the file is written, so a stage that fails
/// half-way still has its partial output cleaned up.
#[derive(Debug, Default)]
pub struct TempArtifacts {
    paths: Vec<PathBuf>,
}

impl TempArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a path for removal.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Paths still pending removal.
    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Removes leftovers of a previous run, logging rather than failing.
    pub fn clear_stale<'a>(paths: impl IntoIterator<Item = &'a Path>) {
        for path in paths {
            match remove_if_present(path) {
                Ok(true) => tracing::info!(path = %path.display(), "Removed stale artifact"),
                Ok(false) => {}
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove stale artifact"
                ),
            }
        }
    }

    /// Removes every tracked file.
    ///
    /// Missing files are not an error. On failure the remaining paths stay
    /// tracked and are retried when the set is dropped.
    pub fn remove_all(&mut self) -> Result<(), CleanupError> {
        while let Some(path) = self.paths.first().cloned() {
            match remove_if_present(&path) {
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "Removed temp artifact");
                    self.paths.remove(0);
                }
                Err(source) => return Err(CleanupError { path, source }),
            }
        }
        Ok(())
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(e) = remove_if_present(&path) {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove temp artifact"
                );
            }
        }
    }
}

/// A temp file that could not be removed.
#[derive(Debug, thiserror::Error)]
#[error("failed to remove {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_keyed_by_job_name() {
        let paths = ArtifactPaths::for_job("/tmp", "porch");
        assert_eq!(paths.photo, PathBuf::from("/tmp/porch.jpg"));
        assert_eq!(paths.raw_video, PathBuf::from("/tmp/porch.h264"));
        assert_eq!(paths.video, PathBuf::from("/tmp/porch.mp4"));
        assert_eq!(paths.for_kind(CaptureKind::Photo).len(), 1);
        assert_eq!(paths.for_kind(CaptureKind::Video).len(), 2);
    }

    #[test]
    fn test_remove_all_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.jpg");
        std::fs::write(&present, b"x").unwrap();

        let mut temps = TempArtifacts::new();
        temps.track(&present);
        temps.track(dir.path().join("never-written.mp4"));
        temps.remove_all().unwrap();

        assert!(!present.exists());
        assert!(temps.tracked().is_empty());
    }

    #[test]
    fn test_drop_removes_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.h264");
        std::fs::write(&path, b"x").unwrap();

        {
            let mut temps = TempArtifacts::new();
            temps.track(&path);
            temps.track(&path);
            assert_eq!(temps.tracked().len(), 1);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_clear_stale() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::for_job(dir.path(), "job");
        std::fs::write(&paths.raw_video, b"old").unwrap();

        TempArtifacts::clear_stale(paths.for_kind(CaptureKind::Video));

        assert!(!paths.raw_video.exists());
        assert!(!paths.video.exists());
    }
}
