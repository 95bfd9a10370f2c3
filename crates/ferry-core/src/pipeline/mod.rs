//! The deployment state machine.
//!
//! Stages run strictly in order: setup, pre-hooks, archive build, upload,
//! remote trigger, cleanup. Setup, archive build and upload are fatal on
//! failure and end the run as `Aborted`. Pre-hook, trigger and cleanup
//! failures are recorded and the run continues. Once the bootstrap script is
//! uploaded, cleanup always runs.

pub mod report;

use tracing::{debug, error, info, warn};
use url::Url;

use crate::archive::{ArchiveArtifact, ArchiveBuilder};
use crate::command::CommandRunner;
use crate::config::PipelineConfig;
use crate::error::{BuildError, PipelineError, TriggerError};
use crate::exclude::ExcludeRuleSet;
use crate::lock::RunLock;
use crate::release;
use crate::script;
use crate::secrets::{self, MigrationToken};
use crate::transport::RemoteTransport;
use crate::trigger::{self, TriggerClient};

pub use report::{PipelineReport, RunState, Stage, StageOutcome, StageRecord};

/// State produced by setup and owned by the rest of the run.
struct RunContext {
    token: MigrationToken,
    rules: ExcludeRuleSet,
    bootstrap_url: Url,
    migration_url: Option<Url>,
    release: Option<release::ReleaseInfo>,
    _lock: RunLock,
}

pub struct DeploymentPipeline<'a> {
    config: &'a PipelineConfig,
    transport: &'a dyn RemoteTransport,
    trigger: &'a dyn TriggerClient,
    runner: &'a dyn CommandRunner,
}

impl<'a> DeploymentPipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        transport: &'a dyn RemoteTransport,
        trigger: &'a dyn TriggerClient,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config,
            transport,
            trigger,
            runner,
        }
    }

    /// Run every stage and report the terminal state.
    pub fn run(&self) -> PipelineReport {
        let mut report = PipelineReport::new(&self.config.target.alias);
        info!(target_alias = %self.config.target.alias, host = %self.config.target.hostname, "deploying");

        match self.execute(&mut report) {
            Ok(()) => {
                report.state = RunState::Done;
                info!(target_alias = %self.config.target.alias, "deployment done");
            }
            Err(err) => {
                error!(error = %err, "deployment aborted");
                report.state = RunState::Aborted;
                report.error = Some(err.to_string());
            }
        }

        if report.bootstrap_exposed {
            error!(
                path = %self.config.remote_script_path(),
                "bootstrap script may still be reachable on the remote host; remove it manually"
            );
        }
        report
    }

    fn execute(&self, report: &mut PipelineReport) -> Result<(), PipelineError> {
        let ctx = fatal_stage(report, Stage::Setup, |record| self.setup(record))?;
        report.release = ctx.release.clone();

        stage(report, Stage::PreHooks, |record| self.run_pre_hooks(record));

        let artifact = fatal_stage(report, Stage::ArchiveBuild, |record| {
            self.build_archive(&ctx, record).map_err(PipelineError::from)
        })?;
        report.artifact = Some(artifact.clone());

        fatal_stage(report, Stage::Upload, |record| self.upload(&artifact, record))?;
        report.bootstrap_exposed = true;

        stage(report, Stage::RemoteTrigger, |record| self.run_triggers(&ctx, record));

        let mut exposed = true;
        stage(report, Stage::Cleanup, |record| exposed = self.cleanup(record));
        report.bootstrap_exposed = exposed;

        Ok(())
    }

    fn setup(&self, record: &mut StageRecord) -> Result<RunContext, PipelineError> {
        let config = self.config;
        let lock = RunLock::acquire(&config.storage_dir, &config.target.alias)?;

        let rules = config.effective_excludes();
        if config.ship_secrets && config.excludes.contains(&config.secrets_file) {
            info!(file = %config.secrets_file, "secrets file will be shipped with the archive");
            record.note(format!("{} included in archive", config.secrets_file));
        }

        let token = MigrationToken::generate(config.token_length);
        record.note(format!("migration token {}", token.redacted()));

        let setup_error = |e: TriggerError| PipelineError::Setup(e.to_string());
        let bootstrap_url =
            trigger::bootstrap_url(&config.target, &config.script_name).map_err(setup_error)?;
        let migration_url = if config.migrate {
            Some(
                trigger::migration_url(
                    &config.target,
                    &config.migrate_path,
                    token.as_str(),
                    &config.migrate_flags,
                )
                .map_err(setup_error)?,
            )
        } else {
            None
        };

        let release = release_info(config);
        if let Some(info) = &release {
            record.note(format!(
                "release {}{}",
                info.commit,
                if info.dirty { " (dirty)" } else { "" }
            ));
        }

        Ok(RunContext {
            token,
            rules,
            bootstrap_url,
            migration_url,
            release,
            _lock: lock,
        })
    }

    fn run_pre_hooks(&self, record: &mut StageRecord) {
        for command in &self.config.before {
            info!("- {}", command);
            match self.runner.run(command) {
                Ok(output) if output.success() => {
                    if self.config.debug {
                        echo_output(record, command, &output.stdout, &output.stderr);
                    }
                }
                Ok(output) => {
                    let code = output
                        .code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    warn!(command = %command, code = %code, "pre-deploy hook failed");
                    record.warn(format!("`{}` exited with {}", command, code));
                    if self.config.debug {
                        echo_output(record, command, &output.stdout, &output.stderr);
                    }
                }
                Err(err) => {
                    warn!(command = %command, error = %err, "pre-deploy hook could not start");
                    record.warn(format!("`{}` could not start: {}", command, err));
                }
            }
        }
    }

    fn build_archive(
        &self,
        ctx: &RunContext,
        record: &mut StageRecord,
    ) -> Result<ArchiveArtifact, BuildError> {
        let config = self.config;
        let secrets_path = config.secrets_path();
        secrets::write_migration_hash(&secrets_path, &ctx.token).map_err(|source| {
            BuildError::Secrets {
                path: secrets_path.clone(),
                source,
            }
        })?;
        debug!(path = %secrets_path.display(), "migration hash written");

        let artifact = ArchiveBuilder::new(&config.storage_dir, &config.archive_name)
            .skip_path(config.lock_path())
            .build(&config.project_root, &ctx.rules)?;

        record.note(format!(
            "{} ({} files, {} bytes, blake3 {})",
            artifact.path.display(),
            artifact.entries,
            artifact.bytes,
            &artifact.digest[..16]
        ));
        Ok(artifact)
    }

    fn upload(
        &self,
        artifact: &ArchiveArtifact,
        record: &mut StageRecord,
    ) -> Result<(), PipelineError> {
        let archive_path = self.config.remote_archive_path();
        self.transport
            .put(&artifact.path, &archive_path)
            .map_err(PipelineError::Upload)?;
        record.note(format!("archive -> {}", archive_path));

        let script_path = self.config.remote_script_path();
        let script = self.config.bootstrap.render();
        self.transport
            .put_bytes(&script_path, script.as_bytes())
            .map_err(PipelineError::Upload)?;
        record.note(format!("bootstrap script -> {}", script_path));
        Ok(())
    }

    /// Call the bootstrap script, then the migration endpoint.
    ///
    /// The migration only runs once the bootstrap answered `complete`. A
    /// failed or rejected bootstrap leaves the previous release in place,
    /// and migrating it would run against the wrong code.
    fn run_triggers(&self, ctx: &RunContext, record: &mut StageRecord) {
        let token = ctx.token.as_str();

        let bootstrap = self
            .trigger
            .invoke(&ctx.bootstrap_url)
            .and_then(|r| r.error_for_status(&ctx.bootstrap_url))
            .and_then(|r| {
                if script::reports_complete(&r.body) {
                    Ok(r)
                } else {
                    Err(TriggerError::Rejected {
                        url: ctx.bootstrap_url.to_string(),
                        body: r.body.trim().to_string(),
                    })
                }
            });

        let unpacked = match bootstrap {
            Ok(response) => {
                info!(status = response.status, "bootstrap script completed");
                if self.config.debug {
                    record.note(format!("bootstrap: {}", response.body.trim()));
                }
                true
            }
            Err(err) => {
                let message = redact(&err.to_string(), token);
                warn!(error = %message, "bootstrap trigger failed");
                record.warn(format!("bootstrap: {}", message));
                false
            }
        };

        let Some(url) = &ctx.migration_url else {
            return;
        };
        if !unpacked {
            warn!("skipping migration because the archive was not unpacked");
            record.warn("migration skipped: bootstrap did not complete");
            return;
        }

        match self.trigger.invoke(url).and_then(|r| r.error_for_status(url)) {
            Ok(response) => {
                info!(status = response.status, "migration triggered");
                if self.config.debug {
                    record.note(format!("migrate: {}", redact(response.body.trim(), token)));
                }
            }
            Err(err) => {
                let message = redact(&err.to_string(), token);
                warn!(error = %message, "migration trigger failed");
                record.warn(format!("migrate: {}", message));
            }
        }
    }

    /// Remove the remote script. Returns whether it may still be exposed.
    fn cleanup(&self, record: &mut StageRecord) -> bool {
        let script_path = self.config.remote_script_path();

        if let Err(err) = self.transport.delete(&script_path) {
            error!(error = %err, "failed to delete bootstrap script");
            record.warn(err.to_string());
        }

        let exposed = match self.transport.exists(&script_path) {
            Ok(false) => {
                record.note(format!("removed {}", script_path));
                false
            }
            Ok(true) => {
                record.warn(format!("{} still exists on the remote host", script_path));
                true
            }
            Err(err) => {
                record.warn(format!("could not verify removal of {}: {}", script_path, err));
                true
            }
        };

        if self.config.clean_local_archive {
            let builder = ArchiveBuilder::new(&self.config.storage_dir, &self.config.archive_name);
            match builder.remove_artifact() {
                Ok(true) => record.note("local archive removed"),
                Ok(false) => record.warn("local archive was already gone"),
                Err(err) => record.warn(format!("failed to remove local archive: {}", err)),
            }
        }

        exposed
    }
}

/// Run a stage whose failure aborts the pipeline.
fn fatal_stage<T>(
    report: &mut PipelineReport,
    stage: Stage,
    body: impl FnOnce(&mut StageRecord) -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    info!(stage = %stage, "- {}", stage.progress_line());
    let mut record = StageRecord::begin(stage);
    match body(&mut record) {
        Ok(value) => {
            report.push(record.finish());
            Ok(value)
        }
        Err(err) => {
            report.push(record.fail(err.to_string()));
            Err(err)
        }
    }
}

/// Run a stage whose failures are recorded but never abort.
fn stage(report: &mut PipelineReport, stage: Stage, body: impl FnOnce(&mut StageRecord)) {
    info!(stage = %stage, "- {}", stage.progress_line());
    let mut record = StageRecord::begin(stage);
    body(&mut record);
    report.push(record.finish());
}

fn release_info(config: &PipelineConfig) -> Option<release::ReleaseInfo> {
    match release::describe_head(&config.project_root) {
        Ok(Some(info)) => {
            info!(commit = %info.commit, dirty = info.dirty, "releasing");
            Some(info)
        }
        Ok(None) => None,
        Err(err) => {
            debug!(error = %err, "could not read git HEAD");
            None
        }
    }
}

fn echo_output(record: &mut StageRecord, command: &str, stdout: &str, stderr: &str) {
    for line in stdout.lines().chain(stderr.lines()) {
        info!("\t{}", line);
        record.note(format!("{}: {}", command, line));
    }
}

/// Hide the migration token in operator-facing text.
fn redact(text: &str, token: &str) -> String {
    text.replace(token, "<redacted>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_token() {
        let text = "HTTP 500 from https://example.com/migrate?hash=AbCdEf1234&fresh";
        assert_eq!(
            redact(text, "AbCdEf1234"),
            "HTTP 500 from https://example.com/migrate?hash=<redacted>&fresh"
        );
    }
}
