//! Config store for locating and loading ferry.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{FerryConfig, parser};

/// File name looked up in the project root and the global config dir.
pub const CONFIG_FILE_NAME: &str = "ferry.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: Option<PathBuf>,
}

impl ConfigStore {
    /// Use exactly `path`; it must exist.
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
        }
    }

    /// Look for `<project>/ferry.toml`, then the global
    /// `<config_dir>/ferry/ferry.toml`.
    pub fn discover(project_root: &Path) -> Self {
        let global = dirs::config_dir().map(|d| d.join("ferry").join(CONFIG_FILE_NAME));
        Self::discover_with_global(project_root, global.as_deref())
    }

    pub fn discover_with_global(project_root: &Path, global: Option<&Path>) -> Self {
        let project = project_root.join(CONFIG_FILE_NAME);
        let config_path = if project.is_file() {
            Some(project)
        } else {
            global.filter(|p| p.is_file()).map(Path::to_path_buf)
        };
        Self { config_path }
    }

    /// The file that will be loaded, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Load the config; defaults when no file was found.
    pub fn load(&self) -> anyhow::Result<FerryConfig> {
        match &self.config_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                parser::parse_ferry_toml(path)
            }
            None => Ok(FerryConfig::new()),
        }
    }

    /// Write `config` to the store's path.
    pub fn save(&self, config: &FerryConfig) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No config path to save to"))?;
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
