//! Transport for remote disks mounted into the local filesystem.
//!
//! Works with anything that exposes the remote host as a directory: FTP or
//! SSH filesystems, SMB shares, or a plain directory in tests.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{RemoteTransport, ensure_relative_remote};
use crate::error::{TransportError, TransportFailure};

#[derive(Debug, Clone)]
pub struct MountedTransport {
    target: String,
    root: PathBuf,
}

impl MountedTransport {
    pub fn new(target: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, operation: &'static str, remote_path: &str) -> Result<PathBuf, TransportError> {
        ensure_relative_remote(&self.target, operation, remote_path)?;
        if !self.root.is_dir() {
            return Err(TransportError::new(
                &self.target,
                operation,
                remote_path,
                TransportFailure::Connection,
                format!("mount root {} is not available", self.root.display()),
            ));
        }
        Ok(self.root.join(remote_path))
    }

    fn failure(
        &self,
        operation: &'static str,
        remote_path: &str,
        err: std::io::Error,
    ) -> TransportError {
        let kind = match err.kind() {
            ErrorKind::PermissionDenied => TransportFailure::Authentication,
            ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut => TransportFailure::Connection,
            _ => TransportFailure::RemotePath,
        };
        TransportError::new(&self.target, operation, remote_path, kind, err)
    }
}

impl RemoteTransport for MountedTransport {
    fn target(&self) -> &str {
        &self.target
    }

    fn put_bytes(&self, remote_path: &str, contents: &[u8]) -> Result<(), TransportError> {
        let path = self.resolve("put", remote_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.failure("put", remote_path, e))?;
        }
        fs::write(&path, contents).map_err(|e| self.failure("put", remote_path, e))?;
        debug!(alias = %self.target, path = remote_path, bytes = contents.len(), "stored remote file");
        Ok(())
    }

    fn get(&self, remote_path: &str) -> Result<Vec<u8>, TransportError> {
        let path = self.resolve("get", remote_path)?;
        fs::read(&path).map_err(|e| self.failure("get", remote_path, e))
    }

    fn delete(&self, remote_path: &str) -> Result<(), TransportError> {
        let path = self.resolve("delete", remote_path)?;
        fs::remove_file(&path).map_err(|e| self.failure("delete", remote_path, e))?;
        debug!(alias = %self.target, path = remote_path, "deleted remote file");
        Ok(())
    }

    fn exists(&self, remote_path: &str) -> Result<bool, TransportError> {
        let path = self.resolve("exists", remote_path)?;
        path.try_exists()
            .map_err(|e| self.failure("exists", remote_path, e))
    }
}
