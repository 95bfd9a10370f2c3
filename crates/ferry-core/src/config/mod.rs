//! Configuration for deployment runs
//!
//! `ferry.toml` describes packaging settings and named targets. At startup it
//! is combined with the command line and environment into an immutable
//! [`PipelineConfig`] that every stage reads from.

pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod store;

pub use parser::{parse_ferry_toml, parse_ferry_toml_str, to_toml};
pub use pipeline::{
    PipelineConfig, RunOptions, SECRETS_FLAG_ENV, bootstrap_script, exclude_rules,
};
pub use schema::{DeploySettings, ExcludeSettings, FerryConfig, HostingPatchConfig, TargetConfig};
pub use store::{CONFIG_FILE_NAME, ConfigStore};
