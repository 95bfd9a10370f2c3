//! Release archive construction.
//!
//! Walks the project tree in sorted order, drops excluded paths, and writes a
//! single zip artifact into the local storage directory. A stale artifact is
//! removed before every build, so at most one exists at any time.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::error::BuildError;
use crate::exclude::ExcludeRuleSet;

/// The built release payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveArtifact {
    pub path: PathBuf,
    /// Number of member files.
    pub entries: usize,
    /// Size of the artifact on disk.
    pub bytes: u64,
    /// blake3 hex digest of the artifact.
    pub digest: String,
}

#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    storage_dir: PathBuf,
    archive_name: String,
    skip: Vec<PathBuf>,
}

impl ArchiveBuilder {
    pub fn new(storage_dir: impl Into<PathBuf>, archive_name: impl Into<String>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            archive_name: archive_name.into(),
            skip: Vec::new(),
        }
    }

    /// Never archive `path`, regardless of the rule set.
    pub fn skip_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.skip.push(path.into());
        self
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.storage_dir.join(&self.archive_name)
    }

    fn partial_path(&self) -> PathBuf {
        self.storage_dir.join(format!("{}.partial", self.archive_name))
    }

    /// Package `root` minus everything `rules` excludes.
    pub fn build(&self, root: &Path, rules: &ExcludeRuleSet) -> Result<ArchiveArtifact, BuildError> {
        if !root.is_dir() {
            return Err(BuildError::MissingRoot(root.to_path_buf()));
        }

        let artifact = self.artifact_path();
        let partial = self.partial_path();
        for stale in [&artifact, &partial] {
            remove_if_exists(stale).map_err(|source| BuildError::RemoveStale {
                path: stale.clone(),
                source,
            })?;
        }

        fs::create_dir_all(&self.storage_dir).map_err(|source| BuildError::Io {
            path: self.storage_dir.clone(),
            source,
        })?;

        let entries = match self.write_zip(root, rules, &partial, &artifact) {
            Ok(entries) => entries,
            Err(err) => {
                let _ = fs::remove_file(&partial);
                return Err(err);
            }
        };

        fs::rename(&partial, &artifact).map_err(|source| BuildError::Io {
            path: artifact.clone(),
            source,
        })?;

        let (bytes, digest) = digest_file(&artifact).map_err(|source| BuildError::Io {
            path: artifact.clone(),
            source,
        })?;

        debug!(path = %artifact.display(), entries, bytes, "archive written");
        Ok(ArchiveArtifact {
            path: artifact,
            entries,
            bytes,
            digest,
        })
    }

    fn write_zip(
        &self,
        root: &Path,
        rules: &ExcludeRuleSet,
        partial: &Path,
        artifact: &Path,
    ) -> Result<usize, BuildError> {
        let file = File::create(partial).map_err(|source| BuildError::Io {
            path: partial.to_path_buf(),
            source,
        })?;
        let mut zip = zip::ZipWriter::new(file);
        let zip_error = |source: zip::result::ZipError| BuildError::Zip {
            path: partial.to_path_buf(),
            source,
        };

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| self.keep(root, rules, entry, partial, artifact));

        let mut entries = 0;
        for entry in walker {
            let entry = entry.map_err(|source| BuildError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                if !entry.file_type().is_dir() {
                    trace!(path = %entry.path().display(), "skipping non-regular file");
                }
                continue;
            }

            let name = relative_name(root, entry.path());
            let source_path = entry.path();
            let metadata = entry.metadata().map_err(|source| BuildError::Walk {
                path: source_path.to_path_buf(),
                source,
            })?;

            let mut options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .large_file(metadata.len() >= u32::MAX as u64);
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                options = options.unix_permissions(metadata.permissions().mode());
            }

            zip.start_file(name, options).map_err(zip_error)?;
            let mut input = File::open(source_path).map_err(|source| BuildError::Io {
                path: source_path.to_path_buf(),
                source,
            })?;
            io::copy(&mut input, &mut zip).map_err(|source| BuildError::Io {
                path: source_path.to_path_buf(),
                source,
            })?;
            entries += 1;
        }

        zip.finish().map_err(zip_error)?;
        Ok(entries)
    }

    fn keep(
        &self,
        root: &Path,
        rules: &ExcludeRuleSet,
        entry: &DirEntry,
        partial: &Path,
        artifact: &Path,
    ) -> bool {
        let path = entry.path();
        if path == partial || path == artifact || self.skip.iter().any(|s| s == path) {
            return false;
        }
        let name = relative_name(root, path);
        if rules.matches(&name) {
            trace!(path = %name, "excluded");
            return false;
        }
        true
    }

    /// Member names of an existing artifact, in archive order.
    pub fn members(path: &Path) -> Result<Vec<String>, BuildError> {
        let file = File::open(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = zip::ZipArchive::new(file).map_err(|source| BuildError::Zip {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(archive.file_names().map(str::to_string).collect())
    }

    /// Delete the local artifact. Returns whether one existed.
    pub fn remove_artifact(&self) -> io::Result<bool> {
        remove_if_exists(&self.artifact_path())
    }
}

/// `/`-separated path of `path` below `root`.
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

fn digest_file(path: &Path) -> io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let bytes = io::copy(&mut file, &mut hasher)?;
    Ok((bytes, hasher.finalize().to_hex().to_string()))
}
