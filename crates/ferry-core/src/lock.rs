//! Run-level lock over the local artifact storage slot.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::LockError;

/// File name of the lock inside the storage directory.
pub const LOCK_FILE_NAME: &str = ".ferry.lock";

/// Held for the duration of one run; released on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock in `storage_dir`, creating the directory if needed.
    pub fn acquire(storage_dir: &Path, owner: &str) -> Result<Self, LockError> {
        let path = storage_dir.join(LOCK_FILE_NAME);
        fs::create_dir_all(storage_dir).map_err(|source| LockError::Io {
            path: path.clone(),
            source,
        })?;

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(LockError::Held(path));
            }
            Err(source) => return Err(LockError::Io { path, source }),
        };

        // Informational only; the file's existence is the lock.
        let _ = writeln!(
            file,
            "pid={} target={} started={}",
            std::process::id(),
            owner,
            chrono::Utc::now().to_rfc3339()
        );

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to release run lock");
        }
    }
}
