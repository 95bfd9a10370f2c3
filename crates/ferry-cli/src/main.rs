//! Ferry - archive-and-replace deployments for shared PHP hosting
//!
//! Usage:
//!   ferry deploy <server>     # Package, upload and trigger a release
//!   ferry excludes <server>   # List the effective exclude rules
//!   ferry script              # Print the rendered bootstrap script

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferry_core::command::ShellRunner;
use ferry_core::config::{
    ConfigStore, FerryConfig, PipelineConfig, RunOptions, SECRETS_FLAG_ENV, bootstrap_script,
};
use ferry_core::pipeline::{DeploymentPipeline, PipelineReport, StageOutcome, StageRecord};
use ferry_core::transport::MountedTransport;
use ferry_core::trigger::HttpTrigger;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Deploy a PHP application over file transfer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the project, upload it and run the remote bootstrap
    Deploy {
        /// Target alias from ferry.toml
        server: String,

        /// Call the migration endpoint after unpacking (1/0, true/false)
        #[arg(long, default_value = "1", value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
        migrate: bool,

        /// Echo hook output and response bodies (1/0, true/false)
        #[arg(long, default_value = "1", value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
        debug: bool,

        #[command(flatten)]
        project: ProjectArgs,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List the exclude rules a deploy to <server> would apply
    Excludes {
        /// Target alias from ferry.toml
        server: String,

        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Print the bootstrap script that gets uploaded
    Script {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

#[derive(Args)]
struct ProjectArgs {
    /// Project root (defaults to the current directory)
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Config file (defaults to <project>/ferry.toml, then the global one)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ProjectArgs {
    fn root(&self) -> Result<PathBuf> {
        self.project
            .canonicalize()
            .with_context(|| format!("Project root not found: {}", self.project.display()))
    }

    fn load(&self, root: &Path) -> Result<FerryConfig> {
        let store = match &self.config {
            Some(path) => ConfigStore::from_path(path.clone()),
            None => ConfigStore::discover(root),
        };
        match store.config_path() {
            Some(path) => tracing::debug!(path = %path.display(), "loading config"),
            None => tracing::debug!("no ferry.toml found, using defaults"),
        }
        store.load()
    }
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let debug = matches!(cli.command, Commands::Deploy { debug: true, .. });
    let default_filter = if debug { "ferry=debug,info" } else { "ferry=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run_cli(cli.command)
}

fn run_cli(command: Commands) -> Result<()> {
    match command {
        Commands::Deploy {
            server,
            migrate,
            debug,
            project,
            format,
        } => run_deploy(server, migrate, debug, project, format),
        Commands::Excludes { server, project } => run_excludes(server, project),
        Commands::Script { project } => run_script(project),
    }
}

fn run_deploy(
    server: String,
    migrate: bool,
    debug: bool,
    project: ProjectArgs,
    format: OutputFormat,
) -> Result<()> {
    let root = project.root()?;
    let config = project.load(&root)?;
    let options = RunOptions::new(server)
        .with_migrate(migrate)
        .with_debug(debug)
        .with_secrets_flag_from_env();
    let pipeline_config = PipelineConfig::from_config(&config, &root, &options)?;

    let transport = MountedTransport::new(
        pipeline_config.target.alias.clone(),
        pipeline_config.mount_root.clone(),
    );
    let trigger = HttpTrigger::new(pipeline_config.timeout)?;
    let runner = ShellRunner::new(&root);

    let report = DeploymentPipeline::new(&pipeline_config, &transport, &trigger, &runner).run();

    match format {
        OutputFormat::Table => print_report(&report, &pipeline_config),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if !report.is_done() {
        anyhow::bail!(
            "Deployment to '{}' aborted: {}",
            report.target,
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_report(report: &PipelineReport, config: &PipelineConfig) {
    println!();
    println!(
        "{} {}",
        style("Deployment to").bold(),
        style(&report.target).bold().cyan()
    );

    for record in &report.stages {
        print_stage(record);
    }

    if let Some(artifact) = &report.artifact {
        println!();
        println!(
            "  Archive:  {} ({} files, {} bytes)",
            artifact.path.display(),
            artifact.entries,
            artifact.bytes
        );
        println!("  Digest:   {}", style(&artifact.digest).dim());
    }
    if let Some(release) = &report.release {
        let dirty = if release.dirty { " (uncommitted changes)" } else { "" };
        println!("  Commit:   {}{}", release.commit, style(dirty).yellow());
    }

    println!();
    if report.is_done() {
        let warnings = report.warnings().len();
        if warnings == 0 {
            println!("{}", style("✓ Done").green().bold());
        } else {
            println!(
                "{} with {} warning(s)",
                style("✓ Done").green().bold(),
                warnings
            );
        }
    } else {
        println!("{}", style("✗ Aborted").red().bold());
    }

    if report.bootstrap_exposed {
        println!(
            "{} {} may still be reachable on the server; delete it by hand",
            style("⚠").red().bold(),
            config.remote_script_path()
        );
    }
}

fn print_stage(record: &StageRecord) {
    let marker = match record.outcome {
        StageOutcome::Succeeded => style("✓").green(),
        StageOutcome::Warning => style("⚠").yellow(),
        StageOutcome::Failed => style("✗").red(),
    };
    let elapsed = (record.finished_at - record.started_at).num_milliseconds();
    println!(
        "{} {:<16} {}",
        marker,
        record.stage.to_string(),
        style(format!("{}ms", elapsed)).dim()
    );
    for note in &record.notes {
        println!("    {}", note);
    }
    for error in &record.errors {
        println!("    {}", style(error).yellow());
    }
}

fn run_excludes(server: String, project: ProjectArgs) -> Result<()> {
    let root = project.root()?;
    let config = project.load(&root)?;
    let options = RunOptions::new(server).with_secrets_flag_from_env();
    let pipeline_config = PipelineConfig::from_config(&config, &root, &options)?;

    let rules = pipeline_config.effective_excludes();
    for pattern in rules.patterns() {
        println!("{}", pattern);
    }
    if pipeline_config.ship_secrets {
        println!(
            "{} {} is set; {} will be shipped",
            style("•").dim(),
            SECRETS_FLAG_ENV,
            pipeline_config.secrets_file
        );
    }
    Ok(())
}

fn run_script(project: ProjectArgs) -> Result<()> {
    let root = project.root()?;
    let config = project.load(&root)?;
    config.validate()?;
    print!("{}", bootstrap_script(&config.deploy).render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_defaults_to_debug_and_migrate() {
        let cli = Cli::try_parse_from(["ferry", "deploy", "stagingFTP"]).unwrap();
        match cli.command {
            Commands::Deploy {
                server,
                migrate,
                debug,
                ..
            } => {
                assert_eq!(server, "stagingFTP");
                assert!(migrate);
                assert!(debug);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn deploy_accepts_numeric_switches() {
        let cli = Cli::try_parse_from([
            "ferry",
            "deploy",
            "stagingFTP",
            "--migrate",
            "0",
            "--debug",
            "false",
        ])
        .unwrap();
        match cli.command {
            Commands::Deploy { migrate, debug, .. } => {
                assert!(!migrate);
                assert!(!debug);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn deploy_requires_server() {
        assert!(Cli::try_parse_from(["ferry", "deploy"]).is_err());
    }

    #[test]
    fn deploy_with_format_json_parses() {
        let cli =
            Cli::try_parse_from(["ferry", "deploy", "prod", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Deploy {
                format: OutputFormat::Json,
                ..
            }
        ));
    }

    #[test]
    fn excludes_with_project_and_config_parses() {
        let cli = Cli::try_parse_from([
            "ferry",
            "excludes",
            "stagingFTP",
            "--project",
            "/srv/app",
            "--config",
            "/etc/ferry.toml",
        ])
        .unwrap();
        match cli.command {
            Commands::Excludes { server, project } => {
                assert_eq!(server, "stagingFTP");
                assert_eq!(project.project, PathBuf::from("/srv/app"));
                assert_eq!(project.config, Some(PathBuf::from("/etc/ferry.toml")));
            }
            _ => panic!("expected excludes"),
        }
    }

    #[test]
    fn script_parses_without_arguments() {
        let cli = Cli::try_parse_from(["ferry", "script"]).unwrap();
        assert!(matches!(cli.command, Commands::Script { .. }));
    }
}
