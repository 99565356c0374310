//! Cooperative exclusive-resource lock shared by the dispatcher and backends.
//!
//! The lock is a flag, not a mutex: only one command runs at a time, so the
//! flag records whether that command currently owns the package database.
//! When a lock file is configured, acquisition creates it exclusively so a
//! second backend process observes the contention, and release removes it.
//!
//! [`BackendLock`] is cheaply clonable so the interrupt watcher can release the
//! same lock the running capability acquired.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, warn};


const LOCK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lock");

/// Errors raised while acquiring the backend lock.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    /// This process already holds the lock.
    #[error("backend lock is already held by this process")]
    AlreadyHeld,
    /// Another process holds the lock file.
    #[error("lock file {path} is held by another process")]
    Contended {
        /// Lock file path.
        path: Utf8PathBuf,
    },
    /// The lock file could not be created.
    #[error("failed to create lock file {path}: {source}")]
    Create {
        /// Lock file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

#[derive(Debug)]
struct LockState {
    held: AtomicBool,
    file: Option<Utf8PathBuf>,
}

/// Process-wide lock flag, optionally backed by a lock file.
#[derive(Debug, Clone)]
pub struct BackendLock {
    state: Arc<LockState>,
}

impl Default for BackendLock {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl BackendLock {
    /// Creates a lock that only tracks the in-process flag.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::build(None)
    }

    /// Creates a lock backed by the given lock file.
    #[must_use]
    pub fn with_file(path: impl Into<Utf8PathBuf>) -> Self {
        Self::build(Some(path.into()))
    }

    fn build(file: Option<Utf8PathBuf>) -> Self {
        Self {
            state: Arc::new(LockState {
                held: AtomicBool::new(false),
                file,
            }),
        }
    }

    /// Returns the configured lock file, if any.
    #[must_use]
    pub fn file(&self) -> Option<&Utf8Path> {
        self.state.file.as_deref()
    }

    /// Returns `true` while the lock is held.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.state.held.load(Ordering::SeqCst)
    }

    /// Acquires the lock.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::AlreadyHeld`] when the flag is already set,
    /// [`LockError::Contended`] when another process owns the lock file, and
    /// [`LockError::Create`] when the lock file cannot be written.
    pub fn acquire(&self) -> Result<(), LockError> {
        if self
            .state
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LockError::AlreadyHeld);
        }
        if let Some(path) = self.file()
            && let Err(error) = create_lock_file(path)
        {
            self.state.held.store(false, Ordering::SeqCst);
            return Err(error);
        }
        debug!(target: LOCK_TARGET, file = ?self.file(), "backend lock acquired");
        Ok(())
    }

    /// Releases the lock. Releasing an unheld lock does nothing.
    ///
    /// Returns `true` when the lock was held before the call.
    pub fn release(&self) -> bool {
        if !self.state.held.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(path) = self.file() {
            remove_lock_file(path);
        }
        debug!(target: LOCK_TARGET, file = ?self.file(), "backend lock released");
        true
    }
}

fn create_lock_file(path: &Utf8Path) -> Result<(), LockError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            LockError::Contended {
                path: path.to_path_buf(),
            }
        } else {
            LockError::Create {
                path: path.to_path_buf(),
                source: Arc::new(source),
            }
        }
    })?;
    let written = writeln!(file, "{}", std::process::id()).and_then(|()| file.sync_all());
    if let Err(source) = written {
        remove_lock_file(path);
        return Err(LockError::Create {
            path: path.to_path_buf(),
            source: Arc::new(source),
        });
    }
    Ok(())
}

fn remove_lock_file(path: &Utf8Path) {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => {
            warn!(
                target: LOCK_TARGET,
                file = %path,
                error = %error,
                "failed to remove lock file"
            );
        }
        _ => {}
    }
}
