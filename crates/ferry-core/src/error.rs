//! Error taxonomy for deployment runs.
//!
//! Fatal errors end a run in the `Aborted` state. Transport failures during
//! cleanup and trigger failures are recorded in the report instead.

use std::path::PathBuf;

use thiserror::Error;

/// Archive construction failed. Always fatal.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Project root does not exist or is not a directory: {0}")]
    MissingRoot(PathBuf),

    #[error("Failed to remove previous artifact {path}: {source}")]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk project tree at {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to update secrets file {path}: {source}")]
    Secrets {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a transport operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The remote is unreachable (connection lost, mount missing).
    Connection,
    /// Credentials were rejected or access was denied.
    Authentication,
    /// The remote path is invalid, missing, or could not be written.
    RemotePath,
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Connection => "connection failure",
            Self::Authentication => "authentication failure",
            Self::RemotePath => "remote path error",
        };
        f.write_str(label)
    }
}

/// A file-transfer operation against a remote target failed.
#[derive(Debug, Error)]
#[error("{operation} {path} on '{target}' failed ({kind}): {cause}")]
pub struct TransportError {
    pub target: String,
    pub operation: &'static str,
    pub path: String,
    pub kind: TransportFailure,
    pub cause: String,
}

impl TransportError {
    pub fn new(
        target: impl Into<String>,
        operation: &'static str,
        path: impl Into<String>,
        kind: TransportFailure,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self {
            target: target.into(),
            operation,
            path: path.into(),
            kind,
            cause: cause.to_string(),
        }
    }
}

/// A remote trigger call failed or the endpoint reported an error.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Invalid trigger URL: {0}")]
    InvalidUrl(String),

    #[error("Request to {url} failed: {cause}")]
    Request { url: String, cause: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16, body: String },

    #[error("{url} reported failure: {body}")]
    Rejected { url: String, body: String },
}

/// The run lock could not be taken or released.
#[derive(Debug, Error)]
pub enum LockError {
    #[error(
        "Another deployment is already running (lock file {}). If no run is active, a crashed run left it behind: delete it and retry",
        .0.display()
    )]
    Held(PathBuf),

    #[error("Failed to create lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that move the pipeline into the `Aborted` state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Locked(#[from] LockError),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Archive build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Upload failed: {0}")]
    Upload(#[source] TransportError),
}
