//! The resolved, immutable configuration of one deployment run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::exclude::ExcludeRuleSet;
use crate::lock::LOCK_FILE_NAME;
use crate::script::{BootstrapScript, HostingPatch};
use crate::secrets::is_truthy;
use crate::transport::DeploymentTarget;

use super::{CONFIG_FILE_NAME, DeploySettings, FerryConfig};

/// Environment flag that ships the secrets file inside the archive.
pub const SECRETS_FLAG_ENV: &str = "ENV_DEPLOY";

/// Per-invocation switches from the command line and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub target: String,
    pub debug: bool,
    pub migrate: bool,
    pub ship_secrets: bool,
}

impl RunOptions {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            debug: true,
            migrate: true,
            ship_secrets: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    pub fn with_ship_secrets(mut self, ship_secrets: bool) -> Self {
        self.ship_secrets = ship_secrets;
        self
    }

    /// Read [`SECRETS_FLAG_ENV`] from the process environment.
    pub fn with_secrets_flag_from_env(self) -> Self {
        let flag = std::env::var(SECRETS_FLAG_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        self.with_ship_secrets(flag)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub project_root: PathBuf,
    pub target: DeploymentTarget,
    /// Local mount point of the target's remote disk.
    pub mount_root: PathBuf,
    /// Rules before the secrets flag is applied.
    pub excludes: ExcludeRuleSet,
    pub secrets_file: String,
    pub ship_secrets: bool,
    pub storage_dir: PathBuf,
    pub archive_name: String,
    pub script_name: String,
    pub before: Vec<String>,
    pub clean_local_archive: bool,
    pub token_length: usize,
    pub timeout: Option<Duration>,
    pub migrate: bool,
    pub migrate_path: String,
    pub migrate_flags: Vec<String>,
    pub debug: bool,
    pub bootstrap: BootstrapScript,
}

impl PipelineConfig {
    /// Resolve `options.target` against `config`.
    pub fn from_config(
        config: &FerryConfig,
        project_root: &Path,
        options: &RunOptions,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let target_config = config.target(&options.target).ok_or_else(|| {
            let known: Vec<&str> = config.targets.keys().map(String::as_str).collect();
            if known.is_empty() {
                anyhow::anyhow!(
                    "Unknown target '{}': no targets configured in ferry.toml",
                    options.target
                )
            } else {
                anyhow::anyhow!(
                    "Unknown target '{}'. Configured targets: {}",
                    options.target,
                    known.join(", ")
                )
            }
        })?;

        let deploy = &config.deploy;
        let target = DeploymentTarget {
            alias: options.target.clone(),
            base_path: target_config.base_path.clone(),
            hostname: target_config.hostname.clone(),
            scheme: target_config.scheme.clone(),
            public_dir: deploy.public_dir.clone(),
        };

        Ok(Self {
            project_root: project_root.to_path_buf(),
            target,
            mount_root: project_root.join(&target_config.root),
            excludes: exclude_rules(config),
            secrets_file: deploy.secrets_file.clone(),
            ship_secrets: options.ship_secrets,
            storage_dir: project_root.join(&deploy.storage_dir),
            archive_name: deploy.archive_name.clone(),
            script_name: deploy.script_name.clone(),
            before: deploy.before.clone(),
            clean_local_archive: deploy.clean_local_archive,
            token_length: deploy.token_length,
            timeout: deploy.timeout_secs.map(Duration::from_secs),
            migrate: options.migrate,
            migrate_path: deploy.migrate_path.clone(),
            migrate_flags: deploy.migrate_flags.clone(),
            debug: options.debug,
            bootstrap: bootstrap_script(deploy),
        })
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.project_root.join(&self.secrets_file)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.storage_dir.join(&self.archive_name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.storage_dir.join(LOCK_FILE_NAME)
    }

    pub fn remote_archive_path(&self) -> String {
        self.target.project_path(&self.archive_name)
    }

    pub fn remote_script_path(&self) -> String {
        self.target.public_path(&self.script_name)
    }

    /// Rules used for this run, with the secrets file let through when
    /// `ship_secrets` is set.
    pub fn effective_excludes(&self) -> ExcludeRuleSet {
        let mut rules = self.excludes.clone();
        if self.ship_secrets {
            rules.remove(&self.secrets_file);
        }
        rules
    }
}

/// The bootstrap script described by `[deploy]`.
pub fn bootstrap_script(deploy: &DeploySettings) -> BootstrapScript {
    let hosting_patch = deploy.hosting_patch.as_ref().map(|p| HostingPatch {
        file: p.file.clone(),
        search: p.search.clone(),
        replace: p.replace.clone(),
    });
    BootstrapScript::new(deploy.archive_name.clone())
        .with_runtime_dirs(deploy.runtime_dirs.clone())
        .with_hosting_patch(hosting_patch)
}

/// Default rules plus the project config file, adjusted by the `[excludes]` table.
pub fn exclude_rules(config: &FerryConfig) -> ExcludeRuleSet {
    let mut rules = ExcludeRuleSet::defaults(&config.deploy.secrets_file);
    rules.add(CONFIG_FILE_NAME);
    for pattern in &config.excludes.remove {
        rules.remove(pattern);
    }
    for pattern in &config.excludes.add {
        rules.add(pattern.as_str());
    }
    rules
}
