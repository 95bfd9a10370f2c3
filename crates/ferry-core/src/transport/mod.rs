//! File transfer to the remote host.
//!
//! The pipeline only talks to [`RemoteTransport`]; concrete clients live in
//! submodules.

pub mod mounted;

use std::path::{Component, Path};

use serde::Serialize;

use crate::error::{TransportError, TransportFailure};

pub use mounted::MountedTransport;

/// Where a release lands and where its trigger calls go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentTarget {
    /// Name the operator passed on the command line.
    pub alias: String,
    /// Project directory on the remote disk, relative to the transport root.
    pub base_path: String,
    /// Public hostname serving the remote project.
    pub hostname: String,
    /// `https` unless the target says otherwise.
    pub scheme: String,
    /// Web root below `base_path`.
    pub public_dir: String,
}

impl DeploymentTarget {
    /// Remote path of a file directly under the project directory.
    pub fn project_path(&self, name: &str) -> String {
        join_remote(&[&self.base_path, name])
    }

    /// Remote path of a file in the public web root.
    pub fn public_path(&self, name: &str) -> String {
        join_remote(&[&self.base_path, &self.public_dir, name])
    }
}

fn join_remote(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// put/get/delete/exists against a named remote target.
pub trait RemoteTransport {
    /// Alias of the target this transport writes to.
    fn target(&self) -> &str;

    /// Store `contents` at `remote_path`, replacing any existing file.
    fn put_bytes(&self, remote_path: &str, contents: &[u8]) -> Result<(), TransportError>;

    fn get(&self, remote_path: &str) -> Result<Vec<u8>, TransportError>;

    fn delete(&self, remote_path: &str) -> Result<(), TransportError>;

    fn exists(&self, remote_path: &str) -> Result<bool, TransportError>;

    /// Upload a local file to `remote_path`.
    fn put(&self, local_path: &Path, remote_path: &str) -> Result<(), TransportError> {
        let contents = std::fs::read(local_path).map_err(|e| {
            TransportError::new(
                self.target(),
                "put",
                remote_path,
                TransportFailure::RemotePath,
                format!("cannot read local file {}: {}", local_path.display(), e),
            )
        })?;
        self.put_bytes(remote_path, &contents)
    }
}

/// Reject absolute remote paths and parent-directory traversal.
pub fn ensure_relative_remote(
    target: &str,
    operation: &'static str,
    remote_path: &str,
) -> Result<(), TransportError> {
    let path = Path::new(remote_path);
    if remote_path.is_empty() || path.is_absolute() {
        return Err(TransportError::new(
            target,
            operation,
            remote_path,
            TransportFailure::RemotePath,
            "remote paths must be relative",
        ));
    }
    for component in path.components() {
        if let Component::ParentDir = component {
            return Err(TransportError::new(
                target,
                operation,
                remote_path,
                TransportFailure::RemotePath,
                "path traversal not allowed",
            ));
        }
    }
    Ok(())
}
