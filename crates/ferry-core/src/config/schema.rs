//! Schema definitions for ferry.toml

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::script::DEFAULT_RUNTIME_DIRS;
use crate::secrets::MIN_TOKEN_LENGTH;

/// Root configuration structure for ferry.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FerryConfig {
    /// Packaging and trigger settings shared by all targets
    #[serde(default)]
    pub deploy: DeploySettings,

    /// Adjustments to the default exclude rules
    #[serde(default)]
    pub excludes: ExcludeSettings,

    /// Named deployment targets
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploySettings {
    pub archive_name: String,
    pub script_name: String,
    /// Local directory holding the built artifact, relative to the project
    pub storage_dir: PathBuf,
    /// Local key-value secrets file, relative to the project
    pub secrets_file: String,
    pub public_dir: String,
    /// Shell commands run before packaging, in order
    pub before: Vec<String>,
    /// Remove the local artifact after a completed run
    pub clean_local_archive: bool,
    pub token_length: usize,
    /// Per-request timeout for trigger calls; unbounded when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Directories the bootstrap script creates if missing
    pub runtime_dirs: Vec<String>,
    pub migrate_path: String,
    pub migrate_flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosting_patch: Option<HostingPatchConfig>,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            archive_name: "deploy.zip".to_string(),
            script_name: "deploy.php".to_string(),
            storage_dir: PathBuf::from("storage/app"),
            secrets_file: ".env".to_string(),
            public_dir: "public".to_string(),
            before: Vec::new(),
            clean_local_archive: false,
            token_length: 16,
            timeout_secs: None,
            runtime_dirs: DEFAULT_RUNTIME_DIRS.iter().map(|d| d.to_string()).collect(),
            migrate_path: "migrate".to_string(),
            migrate_flags: vec!["fresh".to_string(), "seed".to_string()],
            hosting_patch: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostingPatchConfig {
    pub file: String,
    pub search: String,
    pub replace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExcludeSettings {
    /// Extra patterns appended to the defaults
    pub add: Vec<String>,
    /// Default patterns to drop
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Local mount point of the remote disk
    pub root: PathBuf,
    /// Project directory below the mount root
    #[serde(default)]
    pub base_path: String,
    /// Public hostname for trigger calls
    pub hostname: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "https".to_string()
}

impl FerryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.deploy.validate()?;
        for (name, target) in &self.targets {
            target
                .validate()
                .map_err(|e| anyhow::anyhow!("Target '{}': {}", name, e))?;
        }
        Ok(())
    }

    pub fn target(&self, alias: &str) -> Option<&TargetConfig> {
        self.targets.get(alias)
    }
}

impl DeploySettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_file_name("archive_name", &self.archive_name)?;
        validate_file_name("script_name", &self.script_name)?;
        if self.secrets_file.trim().is_empty() {
            anyhow::bail!("secrets_file must not be empty");
        }
        if self.token_length < MIN_TOKEN_LENGTH {
            anyhow::bail!(
                "token_length must be at least {} (got {})",
                MIN_TOKEN_LENGTH,
                self.token_length
            );
        }
        if self.timeout_secs == Some(0) {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.storage_dir.is_absolute() {
            anyhow::bail!("storage_dir must be relative to the project root");
        }
        if let Some(patch) = &self.hosting_patch {
            if patch.file.trim().is_empty() || patch.search.is_empty() {
                anyhow::bail!("hosting_patch requires a file and a search string");
            }
        }
        Ok(())
    }
}

impl TargetConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hostname.trim().is_empty() {
            anyhow::bail!("hostname must not be empty");
        }
        if self.hostname.contains('/') {
            anyhow::bail!("hostname must not contain a path: {}", self.hostname);
        }
        if !matches!(self.scheme.as_str(), "http" | "https") {
            anyhow::bail!("scheme must be http or https (got {})", self.scheme);
        }
        if self.base_path.split('/').any(|part| part == "..") {
            anyhow::bail!("base_path must not contain '..'");
        }
        Ok(())
    }
}

fn validate_file_name(field: &str, value: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", field);
    }
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        anyhow::bail!("{} must be a plain file name (got {})", field, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        FerryConfig::new().validate().expect("defaults are valid");
    }

    #[test]
    fn short_token_length_is_rejected() {
        let mut config = FerryConfig::new();
        config.deploy.token_length = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn archive_name_must_be_plain() {
        let mut config = FerryConfig::new();
        config.deploy.archive_name = "../deploy.zip".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn target_scheme_is_checked() {
        let mut config = FerryConfig::new();
        config.targets.insert(
            "staging".to_string(),
            TargetConfig {
                root: PathBuf::from("/mnt/staging"),
                base_path: "domains/example.com".to_string(),
                hostname: "example.com".to_string(),
                scheme: "ftp".to_string(),
            },
        );
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("staging"));
    }
}
