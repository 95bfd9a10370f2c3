//! Ferry Core Library
//!
//! Packages a PHP web application into a zip archive, ships it to a host
//! reachable only through file transfer, and triggers unpacking and database
//! migration over HTTP.

pub mod archive;
pub mod command;
pub mod config;
pub mod error;
pub mod exclude;
pub mod lock;
pub mod pipeline;
pub mod release;
pub mod script;
pub mod secrets;
pub mod transport;
pub mod trigger;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{
        ConfigStore, DeploySettings, FerryConfig, PipelineConfig, RunOptions, TargetConfig,
    };

    // Packaging
    pub use crate::archive::{ArchiveArtifact, ArchiveBuilder};
    pub use crate::exclude::ExcludeRuleSet;
    pub use crate::script::BootstrapScript;
    pub use crate::secrets::MigrationToken;

    // Remote side
    pub use crate::command::{CommandOutput, CommandRunner, ShellRunner};
    pub use crate::transport::{DeploymentTarget, MountedTransport, RemoteTransport};
    pub use crate::trigger::{HttpResponse, HttpTrigger, TriggerClient};

    // Pipeline
    pub use crate::error::{BuildError, PipelineError, TransportError, TriggerError};
    pub use crate::pipeline::{DeploymentPipeline, PipelineReport, RunState, Stage, StageOutcome};
}
