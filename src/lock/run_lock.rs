//! Advisory file lock keyed by job name.
//!
//! The lock is an `flock(2)` on `<dir>/<name>.lock`. The kernel drops it
//! when the descriptor closes, which includes process death, so a crashed
//! run never leaves a lock behind. The file content (the holder's PID) is
//! informational only.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use thiserror::Error;

/// Errors that can occur while taking the run lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("another instance of '{name}' is already running{}", holder_suffix(.holder))]
    Contention {
        name: String,
        path: PathBuf,
        holder: Option<u32>,
    },
    #[error("failed to open lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn holder_suffix(holder: &Option<u32>) -> String {
    holder.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
}

/// Entry point for acquiring run locks.
pub struct RunLock;

impl RunLock {
    /// Takes the lock for `name` without blocking.
    ///
    /// Fails with [`LockError::Contention`] if any other open file
    /// description holds it, whether in this process or another.
    pub fn acquire(dir: impl AsRef<Path>, name: &str) -> Result<RunLockHandle, LockError> {
        let path = dir.as_ref().join(format!("{name}.lock"));
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        let mut file = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(locked) => locked,
            Err((mut file, errno)) if errno == Errno::EWOULDBLOCK => {
                let holder = read_holder(&mut file);
                tracing::warn!(job = name, ?holder, "Run lock is held by another instance");
                return Err(LockError::Contention {
                    name: name.to_string(),
                    path,
                    holder,
                });
            }
            Err((_, errno)) => return Err(io_err(io::Error::from(errno))),
        };

        // Informational only; failure to record the PID does not matter.
        let pid = std::process::id();
        let _ = file
            .set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| writeln!(file, "{pid}"))
            .and_then(|_| file.flush());

        tracing::info!(job = name, path = %path.display(), "Run lock acquired");

        Ok(RunLockHandle {
            _file: file,
            path,
            name: name.to_string(),
        })
    }
}

/// Exclusive ownership of a job's run lock.
///
/// Dropping the handle unlocks and closes the descriptor.
pub struct RunLockHandle {
    _file: Flock<File>,
    path: PathBuf,
    name: String,
}

impl fmt::Debug for RunLockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLockHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for RunLockHandle {
    fn drop(&mut self) {
        tracing::debug!(job = %self.name, path = %self.path.display(), "Run lock released");
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let _first = RunLock::acquire(dir.path(), "camera").unwrap();

        match RunLock::acquire(dir.path(), "camera") {
            Err(LockError::Contention { name, holder, .. }) => {
                assert_eq!(name, "camera");
                assert_eq!(holder, Some(std::process::id()));
            }
            other => panic!("expected contention, got {other:?}"),
        }
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunLock::acquire(dir.path(), "camera").unwrap();
        drop(first);

        let again = RunLock::acquire(dir.path(), "camera");
        assert!(again.is_ok());
    }

    #[test]
    fn test_names_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let _front = RunLock::acquire(dir.path(), "front").unwrap();
        assert!(RunLock::acquire(dir.path(), "back").is_ok());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = RunLock::acquire(dir.path().join("nope"), "camera");
        assert!(matches!(result, Err(LockError::Io { .. })));
    }

    #[test]
    fn test_contention_message() {
        let err = LockError::Contention {
            name: "camera".into(),
            path: PathBuf::from("/tmp/camera.lock"),
            holder: Some(42),
        };
        assert_eq!(
            err.to_string(),
            "another instance of 'camera' is already running (pid 42)"
        );
    }
}
