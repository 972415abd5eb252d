//! Single-instance guard.

mod run_lock;

pub use run_lock::{LockError, RunLock, RunLockHandle};
